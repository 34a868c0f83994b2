//! Main application entry point for the UI.

use crate::state::{AppState, CallStatus};
use dioxus::prelude::*;
use std::sync::Arc;

use super::call_panel::CallPanel;

pub(crate) const ROOT_CLASS: &str = "flex h-screen w-full items-center justify-center bg-slate-900 text-slate-100 font-sans overflow-hidden";

#[allow(non_snake_case)]
pub fn App() -> Element {
    let state_arc = use_context::<Arc<AppState>>();

    let mut status = use_signal(|| CallStatus::Idle);
    let mut error_message = use_signal(|| None::<String>);
    let mut volume = use_signal(|| 0.0f32);
    let mut muted = use_signal(|| false);
    let mut frames_sent = use_signal(|| 0u64);
    let mut chunks_scheduled = use_signal(|| 0u64);

    let state_poll = state_arc.clone();
    use_effect(move || {
        let state = state_poll.clone();
        spawn(async move {
            loop {
                let call = state.call_state();
                status.set(call.status());
                error_message.set(call.error_message());
                volume.set(call.volume());
                muted.set(call.is_muted());
                frames_sent.set(call.frames_sent());
                chunks_scheduled.set(call.chunks_scheduled());

                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        });
    });

    rsx! {
        document::Stylesheet { href: asset!("/assets/tailwind_output.css") }

        div {
            class: ROOT_CLASS,

            CallPanel {
                status: status(),
                error_message: error_message(),
                volume: volume(),
                muted: muted(),
                frames_sent: frames_sent(),
                chunks_scheduled: chunks_scheduled(),
                model: state_arc.model.clone(),
                voice: state_arc.voice.clone(),
            }
        }
    }
}
