//! The sigil command grammar stored in each button's `command` field.
//!
//! A single parse step classifies a command string into exactly one variant.
//! Strings that look like a sigil token but don't match any recognized form
//! fall through to [`Command::Shell`] on purpose: the deck UI writes free-form
//! shell commands into the same field, so a malformed widget token simply
//! becomes (and fails as) a shell command.

/// Macro step delimiter inside a `__MULTI_` payload.
pub const MULTI_SEPARATOR: &str = ";;";

/// A parsed button command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `__NEXT_PAGE__`
    NextPage,
    /// `__PREV_PAGE__`
    PrevPage,
    /// `__PAGE_<n>__`
    GoToPage(usize),
    /// `__URL_<address>` — opened with the system URL handler.
    Url(String),
    /// `__TYPE_<text>` — forwarded verbatim to text injection.
    TypeText(String),
    /// `__KEY_<combo>` — the combo string is validated at dispatch time so a
    /// bad token rejects the whole combo instead of a partial keystroke.
    Hotkey(String),
    /// `__MULTI_<step>;;<step>;;...` — steps re-dispatched in order.
    Multi(Vec<String>),
    /// `__DELAY_<ms>` — only meaningful as a macro step; a no-op on its own.
    Delay(u64),
    /// A live-data widget; display handled by the widget scheduler.
    Widget(WidgetKind),
    /// Forwarded to the OBS client.
    Obs(ObsCommand),
    /// Forwarded to the Twitch client.
    Twitch(TwitchCommand),
    /// Anything else: an opaque `/bin/sh -c` command.
    Shell(String),
}

/// Widget families recognized by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetKind {
    /// `__CLOCK__` — HH:MM.
    Clock,
    /// `__CLOCK_S__` — HH:MM:SS.
    ClockSeconds,
    /// `__DATE__` — DD/MM.
    Date,
    /// `__DATE_FULL__` — weekday, day and month (`Fri 29 Aug`).
    DateFull,
    /// `__WEEKDAY__`
    Weekday,
    /// `__CPU__` — percent busy.
    Cpu,
    /// `__RAM__` — percent used.
    Ram,
    /// `__TEMP__` — thermal zone 0, °C.
    Temp,
    /// `__TIMER_<minutes>__` — press to start/pause a countdown.
    Timer(u32),
    /// `__OBS_STATUS__` — streaming/recording glyphs.
    ObsStatus,
    /// `__TWITCH_VIEWERS__`
    TwitchViewers,
    /// `__TWITCH_FOLLOWERS__`
    TwitchFollowers,
}

impl WidgetKind {
    /// Widgets that react to a press. Pure display widgets ignore presses.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Timer(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsCommand {
    ToggleStream,
    ToggleRecord,
    ToggleMute,
    SetScene(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwitchCommand {
    Clip,
    Ad(u32),
    Chat(String),
}

/// Ad break lengths Helix accepts.
pub const TWITCH_AD_DURATIONS: [u32; 6] = [30, 60, 90, 120, 150, 180];

impl Command {
    /// Classify a command string. Case-sensitive; never fails — unmatched
    /// input is a shell command.
    pub fn parse(raw: &str) -> Command {
        match raw {
            "__NEXT_PAGE__" => return Command::NextPage,
            "__PREV_PAGE__" => return Command::PrevPage,
            "__CLOCK__" => return Command::Widget(WidgetKind::Clock),
            "__CLOCK_S__" => return Command::Widget(WidgetKind::ClockSeconds),
            "__DATE__" => return Command::Widget(WidgetKind::Date),
            "__DATE_FULL__" => return Command::Widget(WidgetKind::DateFull),
            "__WEEKDAY__" => return Command::Widget(WidgetKind::Weekday),
            "__CPU__" => return Command::Widget(WidgetKind::Cpu),
            "__RAM__" => return Command::Widget(WidgetKind::Ram),
            "__TEMP__" => return Command::Widget(WidgetKind::Temp),
            "__OBS_STATUS__" => return Command::Widget(WidgetKind::ObsStatus),
            "__TWITCH_VIEWERS__" => return Command::Widget(WidgetKind::TwitchViewers),
            "__TWITCH_FOLLOWERS__" => return Command::Widget(WidgetKind::TwitchFollowers),
            "__OBS_STREAM__" => return Command::Obs(ObsCommand::ToggleStream),
            "__OBS_RECORD__" => return Command::Obs(ObsCommand::ToggleRecord),
            "__OBS_MUTE__" => return Command::Obs(ObsCommand::ToggleMute),
            "__TWITCH_CLIP__" => return Command::Twitch(TwitchCommand::Clip),
            _ => {}
        }

        if let Some(n) = bounded_payload(raw, "__PAGE_").and_then(|p| p.parse().ok()) {
            return Command::GoToPage(n);
        }
        if let Some(mins) = bounded_payload(raw, "__TIMER_").and_then(|p| p.parse().ok()) {
            return Command::Widget(WidgetKind::Timer(mins));
        }
        if let Some(secs) = bounded_payload(raw, "__TWITCH_AD_").and_then(|p| p.parse().ok()) {
            if TWITCH_AD_DURATIONS.contains(&secs) {
                return Command::Twitch(TwitchCommand::Ad(secs));
            }
        }
        if let Some(url) = nonempty_payload(raw, "__URL_") {
            return Command::Url(url.to_string());
        }
        if let Some(text) = payload(raw, "__TYPE_") {
            return Command::TypeText(text.to_string());
        }
        if let Some(combo) = nonempty_payload(raw, "__KEY_") {
            return Command::Hotkey(combo.to_string());
        }
        if let Some(steps) = nonempty_payload(raw, "__MULTI_") {
            return Command::Multi(
                steps
                    .split(MULTI_SEPARATOR)
                    .map(str::to_string)
                    .collect(),
            );
        }
        if let Some(ms) = bounded_payload(raw, "__DELAY_")
            .or_else(|| payload(raw, "__DELAY_"))
            .and_then(|p| p.parse().ok())
        {
            return Command::Delay(ms);
        }
        if let Some(scene) = nonempty_payload(raw, "__OBS_SCENE_") {
            return Command::Obs(ObsCommand::SetScene(scene.to_string()));
        }
        if let Some(msg) = nonempty_payload(raw, "__TWITCH_CHAT_") {
            return Command::Twitch(TwitchCommand::Chat(msg.to_string()));
        }

        Command::Shell(raw.to_string())
    }
}

/// Payload of `__<NAME>_<payload>` (open-ended form, may be empty).
fn payload<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix)
}

fn nonempty_payload<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix).filter(|p| !p.is_empty())
}

/// Payload of `__<NAME>_<payload>__` (closed form).
fn bounded_payload<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix)?
        .strip_suffix("__")
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_tokens_never_reach_shell() {
        assert_eq!(Command::parse("__NEXT_PAGE__"), Command::NextPage);
        assert_eq!(Command::parse("__PREV_PAGE__"), Command::PrevPage);
        assert_eq!(Command::parse("__PAGE_0__"), Command::GoToPage(0));
        assert_eq!(Command::parse("__PAGE_7__"), Command::GoToPage(7));
        for raw in ["__NEXT_PAGE__", "__PREV_PAGE__", "__PAGE_0__", "__PAGE_12__"] {
            assert!(!matches!(Command::parse(raw), Command::Shell(_)), "{raw}");
        }
    }

    #[test]
    fn multi_splits_ordered_steps() {
        let cmd = Command::parse("__MULTI_firefox;;__DELAY_200;;__KEY_ctrl+t");
        let Command::Multi(steps) = cmd else {
            panic!("expected Multi");
        };
        assert_eq!(steps, vec!["firefox", "__DELAY_200", "__KEY_ctrl+t"]);
        assert_eq!(Command::parse(&steps[1]), Command::Delay(200));
        assert_eq!(
            Command::parse(&steps[2]),
            Command::Hotkey("ctrl+t".to_string())
        );
    }

    #[test]
    fn delay_accepts_open_and_closed_forms() {
        assert_eq!(Command::parse("__DELAY_200"), Command::Delay(200));
        assert_eq!(Command::parse("__DELAY_200__"), Command::Delay(200));
        assert_eq!(Command::parse("__DELAY_0__"), Command::Delay(0));
        assert!(matches!(
            Command::parse("__DELAY_soon__"),
            Command::Shell(_)
        ));
    }

    #[test]
    fn widget_tokens() {
        assert_eq!(
            Command::parse("__CLOCK__"),
            Command::Widget(WidgetKind::Clock)
        );
        assert_eq!(
            Command::parse("__TIMER_5__"),
            Command::Widget(WidgetKind::Timer(5))
        );
        assert_eq!(
            Command::parse("__OBS_STATUS__"),
            Command::Widget(WidgetKind::ObsStatus)
        );
        assert!(WidgetKind::Timer(5).is_interactive());
        assert!(!WidgetKind::Clock.is_interactive());
    }

    #[test]
    fn integration_tokens() {
        assert_eq!(
            Command::parse("__OBS_SCENE_Gaming Scene"),
            Command::Obs(ObsCommand::SetScene("Gaming Scene".to_string()))
        );
        assert_eq!(
            Command::parse("__TWITCH_AD_90__"),
            Command::Twitch(TwitchCommand::Ad(90))
        );
        assert_eq!(
            Command::parse("__TWITCH_CHAT_hello chat"),
            Command::Twitch(TwitchCommand::Chat("hello chat".to_string()))
        );
    }

    #[test]
    fn disallowed_ad_duration_degrades_to_shell() {
        assert_eq!(
            Command::parse("__TWITCH_AD_45__"),
            Command::Shell("__TWITCH_AD_45__".to_string())
        );
    }

    #[test]
    fn malformed_sigils_degrade_to_shell() {
        for raw in [
            "__PAGE_x__",
            "__TIMER___",
            "__CLOCKS__",
            "__PAGE_3", // missing closing underscores
            "__WIDGET_UNKNOWN__",
        ] {
            assert_eq!(Command::parse(raw), Command::Shell(raw.to_string()), "{raw}");
        }
    }

    #[test]
    fn plain_strings_are_shell() {
        assert_eq!(
            Command::parse("firefox --new-window"),
            Command::Shell("firefox --new-window".to_string())
        );
    }
}
