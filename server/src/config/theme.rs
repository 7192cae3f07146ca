//! Built-in color themes.

use lamp::Rgb;

/// Defaults a named theme contributes. `None` fields fall through to the
/// hardcoded fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub my_turn_color: Rgb,
    pub my_turn_brightness: u8,
    pub opponent_turn_color: Rgb,
    pub opponent_turn_brightness: u8,
    pub check_color: Option<Rgb>,
    pub move_notification_color: Option<Rgb>,
}

pub const THEMES: &[Theme] = &[
    Theme {
        name: "classic",
        my_turn_color: Rgb::new(0, 255, 0),
        my_turn_brightness: 40,
        opponent_turn_color: Rgb::new(255, 0, 0),
        opponent_turn_brightness: 40,
        check_color: None,
        move_notification_color: None,
    },
    Theme {
        name: "royal",
        my_turn_color: Rgb::new(128, 0, 255),
        my_turn_brightness: 50,
        opponent_turn_color: Rgb::new(255, 180, 0),
        opponent_turn_brightness: 40,
        check_color: Some(Rgb::new(255, 0, 64)),
        move_notification_color: None,
    },
    Theme {
        name: "ocean",
        my_turn_color: Rgb::new(0, 200, 180),
        my_turn_brightness: 45,
        opponent_turn_color: Rgb::new(255, 110, 80),
        opponent_turn_brightness: 40,
        check_color: None,
        move_notification_color: Some(Rgb::new(180, 240, 255)),
    },
    Theme {
        name: "mono",
        my_turn_color: Rgb::WHITE,
        my_turn_brightness: 60,
        opponent_turn_color: Rgb::WHITE,
        opponent_turn_brightness: 15,
        check_color: Some(Rgb::WHITE),
        move_notification_color: None,
    },
];

/// Case-insensitive lookup.
pub fn find_theme(name: &str) -> Option<&'static Theme> {
    let name = name.trim();
    THEMES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

pub fn theme_names() -> impl Iterator<Item = &'static str> {
    THEMES.iter().map(|t| t.name)
}
