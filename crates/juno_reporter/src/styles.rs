use owo_colors::Style;

/// Semantic styles for the interactive stream.
///
/// The default value has every slot set to a plain style, which renders no
/// escape sequences at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Styles {
    pub counter: Style,
    pub ok: Style,
    pub fail: Style,
    pub error: Style,
    pub pass_text: Style,
    pub fail_text: Style,
    pub error_text: Style,
}

impl Styles {
    #[must_use]
    pub fn new(color: bool) -> Self {
        let mut styles = Self::default();
        if color {
            styles.colorize();
        }
        styles
    }

    pub fn colorize(&mut self) {
        self.counter = Style::new().yellow().on_blue();
        self.ok = Style::new().black().on_green();
        self.fail = Style::new().yellow().on_red();
        self.error = Style::new().white().on_red().bold();
        self.pass_text = Style::new().green();
        self.fail_text = Style::new().yellow();
        self.error_text = Style::new().red();
    }
}
