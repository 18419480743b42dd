//! The page the demo drives: one capture control, two score readouts and
//! the glow overlay.

use std::io::Write;

/// CSS-style class that makes the overlay visible.
pub const VISIBLE_CLASS: &str = "visible";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLabel {
    Loading,
    Enable,
    Disable,
}

impl ControlLabel {
    pub fn text(self) -> &'static str {
        match self {
            ControlLabel::Loading => "LOADING...",
            ControlLabel::Enable => "ENABLE WEBCAM",
            ControlLabel::Disable => "DISABLE WEBCAM",
        }
    }
}

pub trait Page {
    fn set_control(&mut self, label: ControlLabel, enabled: bool);
    fn set_pucker_value(&mut self, text: &str);
    fn set_shrug_value(&mut self, text: &str);
    /// Add the visible class to the overlay.
    fn show_overlay(&mut self);
    /// Remove the visible class from the overlay.
    fn hide_overlay(&mut self);
}

/// Renders the page as a single, continuously rewritten terminal line.
pub struct TerminalPage<W: Write> {
    out: W,
    label: ControlLabel,
    enabled: bool,
    pucker: String,
    shrug: String,
    overlay_visible: bool,
}

impl<W: Write> TerminalPage<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            label: ControlLabel::Loading,
            enabled: false,
            pucker: "-".into(),
            shrug: "-".into(),
            overlay_visible: false,
        }
    }

    fn status_line(&self) -> String {
        let control = if self.enabled {
            format!("[ {} ]", self.label.text())
        } else {
            format!("( {} )", self.label.text())
        };
        let overlay = if self.overlay_visible { "  *** GLOW ***" } else { "" };
        format!(
            "{control}  pucker {}  shrug {}{overlay}",
            self.pucker, self.shrug
        )
    }

    fn render(&mut self) {
        let line = self.status_line();
        // Clear the line, return the cursor, redraw.
        if let Err(e) = write!(self.out, "\x1b[2K\r{line}").and_then(|_| self.out.flush()) {
            tracing::debug!(error = %e, "page render failed");
        }
    }
}

impl<W: Write> Page for TerminalPage<W> {
    fn set_control(&mut self, label: ControlLabel, enabled: bool) {
        self.label = label;
        self.enabled = enabled;
        self.render();
    }

    fn set_pucker_value(&mut self, text: &str) {
        self.pucker = text.to_string();
        self.render();
    }

    fn set_shrug_value(&mut self, text: &str) {
        self.shrug = text.to_string();
        self.render();
    }

    fn show_overlay(&mut self) {
        tracing::debug!(class = VISIBLE_CLASS, "overlay class added");
        self.overlay_visible = true;
        self.render();
    }

    fn hide_overlay(&mut self) {
        tracing::debug!(class = VISIBLE_CLASS, "overlay class removed");
        self.overlay_visible = false;
        self.render();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn last_line(buf: &[u8]) -> String {
        let text = String::from_utf8_lossy(buf);
        text.rsplit('\r').next().unwrap_or_default().to_string()
    }

    #[test]
    fn test_initial_render_shows_loading_disabled() {
        let mut page = TerminalPage::new(Vec::new());
        page.set_control(ControlLabel::Loading, false);
        assert_eq!(last_line(&page.out), "( LOADING... )  pucker -  shrug -");
    }

    #[test]
    fn test_scores_and_glow() {
        let mut page = TerminalPage::new(Vec::new());
        page.set_control(ControlLabel::Disable, true);
        page.set_pucker_value("0.35");
        page.set_shrug_value("0.10");
        page.show_overlay();
        assert_eq!(
            last_line(&page.out),
            "[ DISABLE WEBCAM ]  pucker 0.35  shrug 0.10  *** GLOW ***"
        );

        page.hide_overlay();
        assert!(!last_line(&page.out).contains("GLOW"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ControlLabel::Enable.text(), "ENABLE WEBCAM");
        assert_eq!(ControlLabel::Disable.text(), "DISABLE WEBCAM");
    }
}
