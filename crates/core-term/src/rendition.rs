//! Graphics renditions (SGR state).
//!
//! A rendition is the full set of visual attributes a cell can carry. The
//! conversion to and from CSI parameters accepts both the legacy semicolon
//! forms (`38;2;R;G;B`) and the colon sub-parameter forms (`38:2::R:G:B`,
//! `4:3`); emission prefers the colon forms for extended colors.

use core_vt::Params;

/// A color slot. `None` means the terminal default for the slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Color {
    #[default]
    None,
    Palette(u8),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FontWeight {
    #[default]
    None,
    Bold,
    Dim,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BlinkMode {
    #[default]
    None,
    Normal,
    Rapid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UnderlineMode {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GraphicsRendition {
    pub fg: Color,
    pub bg: Color,
    pub underline_color: Color,
    pub font_weight: FontWeight,
    pub blink_mode: BlinkMode,
    pub underline_mode: UnderlineMode,
    pub italic: bool,
    pub overline: bool,
    pub inverted: bool,
    pub invisible: bool,
    pub strike_through: bool,
}

enum ColorSlot {
    Fg,
    Bg,
    Underline,
}

impl GraphicsRendition {
    pub fn from_csi_params(params: &Params) -> GraphicsRendition {
        let mut result = GraphicsRendition::default();
        result.update_with_csi_params(params);
        result
    }

    /// Apply an SGR parameter list on top of the current state.
    pub fn update_with_csi_params(&mut self, params: &Params) {
        if params.is_empty() {
            // `CSI m` is `CSI 0 m`.
            *self = GraphicsRendition::default();
            return;
        }

        let mut i = 0;
        while i < params.len() {
            match params.get(i, 0) {
                0 => *self = GraphicsRendition::default(),
                1 => self.font_weight = FontWeight::Bold,
                2 => self.font_weight = FontWeight::Dim,
                3 => self.italic = true,
                4 => {
                    self.underline_mode = match params.get_subparam(i, 1, 1) {
                        0 => UnderlineMode::None,
                        2 => UnderlineMode::Double,
                        3 => UnderlineMode::Curly,
                        4 => UnderlineMode::Dotted,
                        5 => UnderlineMode::Dashed,
                        _ => UnderlineMode::Single,
                    };
                }
                5 => self.blink_mode = BlinkMode::Normal,
                6 => self.blink_mode = BlinkMode::Rapid,
                7 => self.inverted = true,
                8 => self.invisible = true,
                9 => self.strike_through = true,
                21 => self.underline_mode = UnderlineMode::Double,
                22 => self.font_weight = FontWeight::None,
                23 => self.italic = false,
                24 => self.underline_mode = UnderlineMode::None,
                25 => self.blink_mode = BlinkMode::None,
                27 => self.inverted = false,
                28 => self.invisible = false,
                29 => self.strike_through = false,
                code @ 30..=37 => self.fg = Color::Palette((code - 30) as u8),
                38 => i += self.extended_color(params, i, ColorSlot::Fg),
                39 => self.fg = Color::None,
                code @ 40..=47 => self.bg = Color::Palette((code - 40) as u8),
                48 => i += self.extended_color(params, i, ColorSlot::Bg),
                49 => self.bg = Color::None,
                53 => self.overline = true,
                55 => self.overline = false,
                58 => i += self.extended_color(params, i, ColorSlot::Underline),
                59 => self.underline_color = Color::None,
                code @ 90..=97 => self.fg = Color::Palette((code - 90 + 8) as u8),
                code @ 100..=107 => self.bg = Color::Palette((code - 100 + 8) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    /// Parse `38`/`48`/`58` in either form. Returns how many *extra*
    /// parameters the legacy semicolon form consumed.
    fn extended_color(&mut self, params: &Params, i: usize, slot: ColorSlot) -> usize {
        let subparams = params.subparams(i);
        let (color, consumed) = if subparams.len() > 1 {
            // Colon form; an optional colorspace sub-parameter sits between
            // the `2` and the channels.
            let color = match subparams.get(1, 0) {
                2 => {
                    let offset = if subparams.len() >= 6 { 3 } else { 2 };
                    Some(Color::Rgb(
                        subparams.get(offset, 0).min(255) as u8,
                        subparams.get(offset + 1, 0).min(255) as u8,
                        subparams.get(offset + 2, 0).min(255) as u8,
                    ))
                }
                5 => Some(Color::Palette(subparams.get(2, 0).min(255) as u8)),
                _ => None,
            };
            (color, 0)
        } else {
            match params.get(i + 1, 0) {
                2 => (
                    Some(Color::Rgb(
                        params.get(i + 2, 0).min(255) as u8,
                        params.get(i + 3, 0).min(255) as u8,
                        params.get(i + 4, 0).min(255) as u8,
                    )),
                    4,
                ),
                5 => (Some(Color::Palette(params.get(i + 2, 0).min(255) as u8)), 2),
                _ => (None, 0),
            }
        };
        if let Some(color) = color {
            match slot {
                ColorSlot::Fg => self.fg = color,
                ColorSlot::Bg => self.bg = color,
                ColorSlot::Underline => self.underline_color = color,
            }
        }
        consumed
    }

    /// Emit a minimal parameter list reproducing this rendition from the
    /// default state. Extended colors use the colon sub-parameter forms.
    pub fn as_csi_params(&self) -> Params {
        let mut params = Params::new();
        params.add_param(0);

        match self.font_weight {
            FontWeight::Bold => params.add_param(1),
            FontWeight::Dim => params.add_param(2),
            FontWeight::None => {}
        }
        if self.italic {
            params.add_param(3);
        }
        match self.underline_mode {
            UnderlineMode::None => {}
            UnderlineMode::Single => params.add_param(4),
            UnderlineMode::Double => params.add_param(21),
            UnderlineMode::Curly => {
                params.add_param(4);
                params.add_subparam(3);
            }
            UnderlineMode::Dotted => {
                params.add_param(4);
                params.add_subparam(4);
            }
            UnderlineMode::Dashed => {
                params.add_param(4);
                params.add_subparam(5);
            }
        }
        match self.blink_mode {
            BlinkMode::None => {}
            BlinkMode::Normal => params.add_param(5),
            BlinkMode::Rapid => params.add_param(6),
        }
        if self.inverted {
            params.add_param(7);
        }
        if self.invisible {
            params.add_param(8);
        }
        if self.strike_through {
            params.add_param(9);
        }
        if self.overline {
            params.add_param(53);
        }

        add_color(&mut params, self.fg, ColorSlot::Fg);
        add_color(&mut params, self.bg, ColorSlot::Bg);
        add_color(&mut params, self.underline_color, ColorSlot::Underline);
        params
    }
}

fn add_color(params: &mut Params, color: Color, slot: ColorSlot) {
    let extended_code = match slot {
        ColorSlot::Fg => 38,
        ColorSlot::Bg => 48,
        ColorSlot::Underline => 58,
    };
    match color {
        Color::None => {}
        Color::Palette(index) => match slot {
            ColorSlot::Underline => {
                params.add_param(58);
                params.add_subparam(5);
                params.add_subparam(u32::from(index));
            }
            _ => {
                let base = match slot {
                    ColorSlot::Fg => 30,
                    _ => 40,
                };
                if index < 8 {
                    params.add_param(base + u32::from(index));
                } else if index < 16 {
                    params.add_param(base + 60 + u32::from(index - 8));
                } else {
                    params.add_param(extended_code);
                    params.add_subparam(5);
                    params.add_subparam(u32::from(index));
                }
            }
        },
        Color::Rgb(r, g, b) => {
            params.add_param(extended_code);
            params.add_subparam(2);
            params.add_empty_subparam();
            params.add_subparam(u32::from(r));
            params.add_subparam(u32::from(g));
            params.add_subparam(u32::from(b));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> GraphicsRendition {
        GraphicsRendition::from_csi_params(&text.parse().unwrap())
    }

    #[test]
    fn basic_attributes() {
        let rendition = parse("1;3;4;7");
        assert_eq!(rendition.font_weight, FontWeight::Bold);
        assert!(rendition.italic);
        assert_eq!(rendition.underline_mode, UnderlineMode::Single);
        assert!(rendition.inverted);
    }

    #[test]
    fn reset_clears_previous() {
        let mut rendition = parse("1;31");
        rendition.update_with_csi_params(&"0".parse().unwrap());
        assert_eq!(rendition, GraphicsRendition::default());

        // Empty parameter list is also a reset.
        let mut rendition = parse("1;31");
        rendition.update_with_csi_params(&"".parse().unwrap());
        assert_eq!(rendition, GraphicsRendition::default());
    }

    #[test]
    fn palette_colors() {
        assert_eq!(parse("31").fg, Color::Palette(1));
        assert_eq!(parse("94").fg, Color::Palette(12));
        assert_eq!(parse("45").bg, Color::Palette(5));
        assert_eq!(parse("103").bg, Color::Palette(11));
        assert_eq!(parse("38;5;123").fg, Color::Palette(123));
        assert_eq!(parse("48:5:9").bg, Color::Palette(9));
    }

    #[test]
    fn rgb_colors_both_forms() {
        assert_eq!(parse("38;2;10;20;30").fg, Color::Rgb(10, 20, 30));
        assert_eq!(parse("38:2:10:20:30").fg, Color::Rgb(10, 20, 30));
        // Colorspace slot between the 2 and the channels.
        assert_eq!(parse("38:2::10:20:30").fg, Color::Rgb(10, 20, 30));
        assert_eq!(parse("58:2::4:5:6").underline_color, Color::Rgb(4, 5, 6));
    }

    #[test]
    fn legacy_form_consumes_following_params() {
        // The color channels must not be re-dispatched as attributes.
        let rendition = parse("38;2;1;2;3;4");
        assert_eq!(rendition.fg, Color::Rgb(1, 2, 3));
        assert_eq!(rendition.underline_mode, UnderlineMode::Single);
    }

    #[test]
    fn underline_styles() {
        assert_eq!(parse("4:3").underline_mode, UnderlineMode::Curly);
        assert_eq!(parse("4:0").underline_mode, UnderlineMode::None);
        assert_eq!(parse("21").underline_mode, UnderlineMode::Double);
        assert_eq!(parse("4;24").underline_mode, UnderlineMode::None);
    }

    #[test]
    fn round_trip_identity() {
        let samples = [
            GraphicsRendition::default(),
            parse("1;3;38:2::10:20:30;48:5:9;58:2::4:5:6"),
            parse("2;4:4;5;8;9;53;31;104"),
            parse("7;38;5;200;6"),
            parse("21;58:5:3"),
        ];
        for rendition in samples {
            let emitted = rendition.as_csi_params();
            assert_eq!(
                GraphicsRendition::from_csi_params(&emitted),
                rendition,
                "emitted {emitted}"
            );
        }
    }
}
