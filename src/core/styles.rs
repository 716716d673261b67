//! Style roles for terminal output
//!
//! Each logical role maps to an optional `colored::Color`. Colouring is applied
//! only when the `enabled` flag passed to [`StyleRole::paint`] is true, so
//! there is no global colour state.
//!
//! ```
//! use plughost::core::styles::StyleRole;
//! assert_eq!(StyleRole::Header.paint("Plugins", false), "Plugins");
//! assert_eq!(StyleRole::Value.paint("1.0.0", true), "1.0.0");
//! ```

use clap::builder::styling::AnsiColor;
use colored::{Color, Colorize};

macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }
        }
    }
}

style! {
    Header      => Some(Color::Yellow),
    Literal     => Some(Color::Cyan),
    Placeholder => Some(Color::Green),
    Success     => Some(Color::Green),
    Failure     => Some(Color::BrightRed),
    Warning     => Some(Color::Yellow),
    Key         => Some(Color::BrightGreen),
    Value       => None,
    Dim         => Some(Color::BrightBlack),
}

impl StyleRole {
    pub fn paint(self, text: &str, enabled: bool) -> String {
        match self.color() {
            Some(color) if enabled => text.color(color).to_string(),
            _ => text.to_string(),
        }
    }

    /// prettytable `style_spec` foreground for this role
    pub fn to_prettytable_spec(self) -> Option<&'static str> {
        Some(match self.color()? {
            Color::Black => "Fk",
            Color::Red => "Fr",
            Color::Green => "Fg",
            Color::Yellow => "Fy",
            Color::Blue => "Fb",
            Color::Magenta => "Fm",
            Color::Cyan => "Fc",
            Color::White => "Fw",
            Color::BrightBlack => "FK",
            Color::BrightRed => "FR",
            Color::BrightGreen => "FG",
            Color::BrightYellow => "FY",
            Color::BrightBlue => "FB",
            Color::BrightMagenta => "FM",
            Color::BrightCyan => "FC",
            Color::BrightWhite => "FW",
            _ => return None,
        })
    }
}

fn color_to_ansi(c: Color) -> Option<AnsiColor> {
    use AnsiColor as A;
    Some(match c {
        Color::Black => A::Black,
        Color::Red => A::Red,
        Color::Green => A::Green,
        Color::Yellow => A::Yellow,
        Color::Blue => A::Blue,
        Color::Magenta => A::Magenta,
        Color::Cyan => A::Cyan,
        Color::White => A::White,
        Color::BrightBlack => A::BrightBlack,
        Color::BrightRed => A::BrightRed,
        Color::BrightGreen => A::BrightGreen,
        Color::BrightYellow => A::BrightYellow,
        Color::BrightBlue => A::BrightBlue,
        Color::BrightMagenta => A::BrightMagenta,
        Color::BrightCyan => A::BrightCyan,
        Color::BrightWhite => A::BrightWhite,
        _ => return None,
    })
}

/// clap help styles built from the same roles
pub fn palette_to_clap(enabled: bool) -> clap::builder::Styles {
    use clap::builder::styling::{Color as ClapColor, Style};
    if !enabled {
        return clap::builder::Styles::plain();
    }

    let style = |role: StyleRole, bold: bool| {
        let mut s = Style::new();
        if let Some(col) = role.color().and_then(color_to_ansi) {
            s = s.fg_color(Some(ClapColor::Ansi(col)));
        }
        if bold {
            s = s.bold();
        }
        s
    };

    clap::builder::Styles::styled()
        .header(style(StyleRole::Header, true))
        .usage(style(StyleRole::Header, true))
        .literal(style(StyleRole::Literal, false))
        .placeholder(style(StyleRole::Placeholder, false))
        .valid(style(StyleRole::Success, false))
        .invalid(style(StyleRole::Failure, false))
        .error(style(StyleRole::Failure, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_respects_enabled_flag() {
        colored::control::set_override(true);
        let painted = StyleRole::Failure.paint("boom", true);
        colored::control::unset_override();
        assert!(painted.starts_with("\x1b[") && painted.contains("boom"));
        assert_eq!(StyleRole::Failure.paint("boom", false), "boom");
    }

    #[test]
    fn uncoloured_roles_stay_plain() {
        assert_eq!(StyleRole::Value.paint("text", true), "text");
        assert_eq!(StyleRole::Value.to_prettytable_spec(), None);
    }

    #[test]
    fn prettytable_spec_matches_role_colour() {
        assert_eq!(StyleRole::Success.to_prettytable_spec(), Some("Fg"));
        assert_eq!(StyleRole::Dim.to_prettytable_spec(), Some("FK"));
    }

    #[test]
    fn palette_to_clap_differs_when_enabled() {
        let plain = format!("{:?}", palette_to_clap(false));
        let styled = format!("{:?}", palette_to_clap(true));
        assert_ne!(plain, styled);
    }
}
