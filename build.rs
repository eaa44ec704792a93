use std::env;

use regex::Regex;

/// Preset categories resolved by `SystemConfig::from_features`, with their
/// members in priority order and the value used when none is selected.
const CATEGORIES: &[(&str, &[&str], &str)] = &[
    (
        "OSC",
        &["INTERNAL_PLL", "INTERNAL", "EXTERNAL_PLL", "EXTERNAL"],
        "internal FRC without PLL (FOSC 7.37 MHz, FCY 3.685 MHz)",
    ),
    ("WDT", &["NORMAL", "LONG"], "watchdog off"),
    ("BOR", &["2V0", "2V7", "4V2"], "brown-out reset off"),
];

fn main() {
    let feature = Regex::new(r"^CARGO_FEATURE_(OSC|WDT|BOR)_([0-9A-Z_]+)$").unwrap();

    let selected: Vec<(String, String)> = env::vars()
        .filter_map(|(key, _)| {
            feature
                .captures(&key)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        })
        .collect();

    for (category, members, fallback) in CATEGORIES {
        // Keep priority order, not environment order
        let chosen: Vec<&str> = members
            .iter()
            .copied()
            .filter(|m| selected.iter().any(|(c, s)| c == category && s == m))
            .collect();

        match chosen.as_slice() {
            [] if *category == "OSC" => {
                println!(
                    "cargo:warning=no oscillator preset feature selected: using {}",
                    fallback
                );
            }
            [] | [_] => {}
            [first, ..] => {
                println!(
                    "cargo:warning=several {} presets selected ({}): using {}",
                    category.to_lowercase(),
                    chosen.join(", ").to_lowercase().replace('_', "-"),
                    first.to_lowercase().replace('_', "-"),
                );
            }
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
