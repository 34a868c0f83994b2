use crate::state::{AppState, CallStatus};
use dioxus::prelude::*;
use std::sync::Arc;

pub fn status_text(status: CallStatus, error_message: Option<&str>) -> String {
    match status {
        CallStatus::Idle => "Tap the microphone to start a call.".to_string(),
        CallStatus::Connecting => "Connecting to AI...".to_string(),
        CallStatus::Connected => "Listening...".to_string(),
        CallStatus::Error => error_message
            .unwrap_or("Connection to AI failed. Please try again.")
            .to_string(),
    }
}

fn ring_class(status: CallStatus) -> String {
    format!(
        "absolute inset-0 rounded-full transition-transform duration-100 {}",
        if status == CallStatus::Connected { "bg-indigo-500/20" } else { "bg-slate-800" }
    )
}

fn mic_button_class(status: CallStatus) -> String {
    format!(
        "relative w-32 h-32 rounded-full flex items-center justify-center text-4xl border transition-all duration-200 {}",
        match status {
            CallStatus::Connected => "bg-indigo-500/10 border-indigo-500/50 text-indigo-300",
            CallStatus::Connecting => "bg-slate-800 border-slate-700 text-slate-500 cursor-wait",
            CallStatus::Error => "bg-rose-500/10 border-rose-500/50 text-rose-400 hover:bg-rose-500/20",
            CallStatus::Idle => "bg-emerald-500/10 border-emerald-500/50 text-emerald-400 hover:bg-emerald-500/20",
        }
    )
}

fn status_line_class(status: CallStatus) -> String {
    format!(
        "text-sm text-center min-h-[1.5rem] {}",
        if status == CallStatus::Error { "text-rose-400" } else { "text-slate-300" }
    )
}

fn mute_button_class(muted: bool) -> String {
    format!(
        "p-4 rounded-xl flex flex-col items-center gap-2 border transition-all duration-200 {}",
        if muted {
            "bg-amber-500/10 border-amber-500/50 text-amber-400 hover:bg-amber-500/20"
        } else {
            "bg-slate-800 border-slate-700 text-slate-300 hover:bg-slate-700"
        }
    )
}

const PANEL_CLASS: &str = "w-full max-w-md flex flex-col items-center gap-8 p-8";
const TITLE_CLASS: &str = "text-2xl font-bold text-white";
const SUBTITLE_CLASS: &str = "text-xs text-slate-500 mt-1";
const RING_BOX_CLASS: &str = "relative w-48 h-48 flex items-center justify-center";
const CONTROLS_CLASS: &str = "grid grid-cols-2 gap-4 w-full";
const LABEL_CLASS: &str = "text-xs font-bold";
const HANG_UP_CLASS: &str = "p-4 rounded-xl flex flex-col items-center gap-2 border bg-rose-500/10 border-rose-500/50 text-rose-400 hover:bg-rose-500/20 transition-all duration-200";
const START_CLASS: &str = "w-full p-4 rounded-xl border bg-emerald-500/10 border-emerald-500/50 text-emerald-400 hover:bg-emerald-500/20 font-bold transition-all duration-200";
const COUNTERS_CLASS: &str = "text-xs text-slate-500 font-mono";

/// Scale of the ring around the microphone button. Speech RMS rarely goes
/// above 0.25, so that maps to the largest ring.
fn ring_scale(volume: f32) -> f32 {
    1.0 + (volume * 4.0).clamp(0.0, 1.0) * 0.6
}

#[allow(non_snake_case)]
#[component]
pub fn CallPanel(
    status: CallStatus,
    error_message: Option<String>,
    volume: f32,
    muted: bool,
    frames_sent: u64,
    chunks_scheduled: u64,
    model: String,
    voice: String,
) -> Element {
    let state_arc = use_context::<Arc<AppState>>();

    let state_start = state_arc.clone();
    let on_start = move |_| state_start.call.start();

    let state_stop = state_arc.clone();
    let on_stop = move |_| state_stop.call.stop();

    let state_mute = state_arc.clone();
    let on_mute_toggle = move |_| state_mute.call.set_muted(!muted);

    let in_call = matches!(status, CallStatus::Connecting | CallStatus::Connected);
    let connecting = status == CallStatus::Connecting;
    let scale = if status == CallStatus::Connected && !muted {
        ring_scale(volume)
    } else {
        1.0
    };
    let text = status_text(status, error_message.as_deref());

    rsx! {
        div {
            class: PANEL_CLASS,

            div {
                class: "text-center",
                h1 { class: TITLE_CLASS, "Live Tutor" }
                p { class: SUBTITLE_CLASS, "{model} · {voice}" }
            }

            div {
                class: RING_BOX_CLASS,

                div {
                    class: ring_class(status),
                    style: "transform: scale({scale});",
                }

                button {
                    class: mic_button_class(status),
                    disabled: in_call,
                    onclick: on_start,
                    if muted && in_call { "🔇" } else { "🎙️" }
                }
            }

            p {
                class: status_line_class(status),
                "{text}"
            }

            if in_call {
                div {
                    class: CONTROLS_CLASS,

                    button {
                        class: mute_button_class(muted),
                        disabled: connecting,
                        onclick: on_mute_toggle,
                        span { class: LABEL_CLASS, if muted { "Unmute" } else { "Mute" } }
                    }

                    button {
                        class: HANG_UP_CLASS,
                        onclick: on_stop,
                        span { class: LABEL_CLASS, "Hang up" }
                    }
                }
            } else {
                button {
                    class: START_CLASS,
                    onclick: move |_| state_arc.call.start(),
                    if status == CallStatus::Error { "Try Again" } else { "Start Call" }
                }
            }

            if status == CallStatus::Connected {
                div {
                    class: COUNTERS_CLASS,
                    "sent {frames_sent} · received {chunks_scheduled}"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(
            status_text(CallStatus::Idle, None),
            "Tap the microphone to start a call."
        );
        assert_eq!(status_text(CallStatus::Connecting, None), "Connecting to AI...");
        assert_eq!(status_text(CallStatus::Connected, None), "Listening...");
        assert_eq!(status_text(CallStatus::Error, Some("boom")), "boom");
    }

    /// Selector for a utility class as it appears in the compiled stylesheet.
    fn selector(class: &str) -> String {
        let mut escaped = String::from(".");
        for c in class.chars() {
            if matches!(c, ':' | '/' | '[' | ']' | '.') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    #[test]
    fn test_stylesheet_defines_every_panel_class() {
        let css = include_str!("../../assets/tailwind_output.css");
        let statuses = [
            CallStatus::Idle,
            CallStatus::Connecting,
            CallStatus::Connected,
            CallStatus::Error,
        ];

        let mut classes: Vec<String> = [
            PANEL_CLASS,
            TITLE_CLASS,
            SUBTITLE_CLASS,
            RING_BOX_CLASS,
            CONTROLS_CLASS,
            LABEL_CLASS,
            HANG_UP_CLASS,
            START_CLASS,
            COUNTERS_CLASS,
            crate::ui::app::ROOT_CLASS,
            "text-center",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for status in statuses {
            classes.push(ring_class(status));
            classes.push(mic_button_class(status));
            classes.push(status_line_class(status));
        }
        classes.push(mute_button_class(true));
        classes.push(mute_button_class(false));

        for class in classes.iter().flat_map(|c| c.split_whitespace()) {
            let selector = selector(class);
            assert!(css.contains(&selector), "missing {selector}");
        }
    }

    #[test]
    fn test_ring_scale_is_bounded() {
        assert_eq!(ring_scale(0.0), 1.0);
        assert_eq!(ring_scale(1.0), 1.6);
        assert_eq!(ring_scale(-1.0), 1.0);
    }
}
