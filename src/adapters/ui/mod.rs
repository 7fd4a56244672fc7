pub mod tui;

use inquire::ui::{Color, RenderConfig, Styled};

/// Applies the prompt theme for all subsequent inquire prompts.
/// Call once before showing the menu.
pub fn init_ui() {
    let mut config = RenderConfig::default();
    config.prompt_prefix = Styled::new("?").with_fg(Color::LightCyan);
    config.highlighted_option_prefix = Styled::new(">").with_fg(Color::LightGreen);
    inquire::set_global_render_config(config);
}
