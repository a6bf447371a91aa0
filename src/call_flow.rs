//! IVR call-flow decisions.
//!
//! Each webhook kind maps to one pure function taking the raw webhook parameters and returning the
//! instructions to hand back to Twilio plus the sparse record update to merge.  No call state is
//! held here; everything that must survive between webhooks lives in the call record.

use crate::consts::*;
use crate::db_types::{CallUpdate, WorkflowType};
use crate::twilio_types::{keys, WebhookParams};
use crate::utils::parse_seconds;

use tracing::{debug, warn};

/// Status labels written to call records.
pub mod status {
    pub const WAITING_SELECTION: &str = "waiting-selection";
    pub const NO_INPUT: &str = "no-input";
    pub const INVALID_SELECTION: &str = "invalid-selection";
    pub const FORWARDING_UNAVAILABLE: &str = "forwarding-unavailable";
    pub const CONNECTING_AGENT: &str = "connecting-agent";
    pub const RECORDING_VOICEMAIL: &str = "recording-voicemail";
    pub const VOICEMAIL_RECORDED: &str = "voicemail-recorded";
    pub const COMPLETED: &str = "completed";
}

/// Deployment settings the flow depends on.
#[derive(Clone, Debug, Default)]
pub struct FlowConfig {
    /// Forwarding destination; `None` disables option 1.
    pub forward_to: Option<String>,
    /// Caller id presented on the bridged leg.
    pub caller_id: Option<String>,
    /// Public origin used to build absolute callback addresses.
    pub public_base_url: Option<String>,
}

impl FlowConfig {
    pub fn callback(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookKind {
    Ring,
    MenuSelection,
    DialOutcome,
    VoicemailCaptured,
}

impl WebhookKind {
    /// Keys a well-formed webhook of this kind always carries.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            WebhookKind::Ring | WebhookKind::MenuSelection | WebhookKind::DialOutcome => {
                &[keys::CALL_SID, keys::FROM, keys::TO]
            }
            WebhookKind::VoicemailCaptured => {
                &[keys::CALL_SID, keys::FROM, keys::TO, keys::RECORDING_URL]
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Speech {
    pub text: String,
    pub voice: Option<String>,
    pub language: Option<String>,
}

impl Speech {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            voice: None,
            language: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gather {
    pub action: String,
    pub num_digits: u16,
    pub timeout: u16,
    pub prompt: Vec<Speech>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dial {
    pub action: String,
    pub timeout: u16,
    pub caller_id: Option<String>,
    pub number: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub action: String,
    pub max_length: u16,
    pub play_beep: bool,
    pub finish_on_key: String,
}

/// One call-control verb.  Every callback-bearing verb posts back to the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Say(Speech),
    Gather(Gather),
    Dial(Dial),
    Record(Record),
    Redirect(String),
    Hangup,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    pub instructions: Vec<Instruction>,
}

impl VoiceResponse {
    fn say(mut self, text: &str) -> Self {
        self.instructions.push(Instruction::Say(Speech::plain(text)));
        self
    }

    fn then(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn dial(&self) -> Option<&Dial> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Dial(dial) => Some(dial),
            _ => None,
        })
    }

    pub fn record(&self) -> Option<&Record> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Record(record) => Some(record),
            _ => None,
        })
    }

    pub fn redirect(&self) -> Option<&str> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Redirect(url) => Some(url.as_str()),
            _ => None,
        })
    }

    pub fn gather(&self) -> Option<&Gather> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Gather(gather) => Some(gather),
            _ => None,
        })
    }
}

/// A merge to apply to the record keyed by `call_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordMerge {
    pub call_id: String,
    pub update: CallUpdate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowOutcome {
    pub response: VoiceResponse,
    pub merge: Option<RecordMerge>,
}

impl FlowOutcome {
    fn new(response: VoiceResponse, call_id: Option<&str>, update: CallUpdate) -> Self {
        Self {
            response,
            merge: call_id.map(|call_id| RecordMerge {
                call_id: call_id.to_string(),
                update,
            }),
        }
    }

    fn without_merge(response: VoiceResponse) -> Self {
        Self {
            response,
            merge: None,
        }
    }
}

pub fn dispatch(kind: WebhookKind, params: &WebhookParams, config: &FlowConfig) -> FlowOutcome {
    match kind {
        WebhookKind::Ring => ring(params, config),
        WebhookKind::MenuSelection => menu_selection(params, config),
        WebhookKind::DialOutcome => dial_outcome(params, config),
        WebhookKind::VoicemailCaptured => voicemail_captured(params, config),
    }
}

/// Caller details every menu-level webhook refreshes.
fn caller_update(params: &WebhookParams, workflow_type: WorkflowType, status: &str) -> CallUpdate {
    CallUpdate {
        from_number: params.owned(keys::FROM),
        to_number: params.owned(keys::TO),
        direction: params.owned(keys::DIRECTION),
        selected_digit: params.owned(keys::DIGITS),
        ..CallUpdate::new(workflow_type, status)
    }
}

fn menu_prompt(config: &FlowConfig) -> VoiceResponse {
    VoiceResponse::default()
        .then(Instruction::Gather(Gather {
            action: config.callback(MENU_SELECTION_PATH),
            num_digits: 1,
            timeout: GATHER_TIMEOUT_SECS,
            prompt: vec![Speech {
                text: MENU_GREETING.to_string(),
                voice: Some(SAY_VOICE.to_string()),
                language: Some(SAY_LANGUAGE.to_string()),
            }],
        }))
        .say(NO_INPUT_MESSAGE)
        .then(Instruction::Redirect(config.callback(RING_PATH)))
}

fn replay_menu(message: &str, config: &FlowConfig) -> VoiceResponse {
    VoiceResponse::default()
        .say(message)
        .then(Instruction::Redirect(config.callback(RING_PATH)))
}

fn voicemail_prompt(message: &str, config: &FlowConfig) -> VoiceResponse {
    VoiceResponse::default()
        .say(message)
        .then(Instruction::Record(Record {
            action: config.callback(VOICEMAIL_PATH),
            max_length: RECORD_MAX_LENGTH_SECS,
            play_beep: true,
            finish_on_key: RECORD_FINISH_ON_KEY.to_string(),
        }))
        .say(NO_RECORDING_MESSAGE)
        .then(Instruction::Hangup)
}

/// Initial webhook: offer the menu and wait for one digit.
pub fn ring(params: &WebhookParams, config: &FlowConfig) -> FlowOutcome {
    FlowOutcome::new(
        menu_prompt(config),
        params.call_sid(),
        CallUpdate {
            selected_digit: None,
            ..caller_update(params, WorkflowType::Ivr, status::WAITING_SELECTION)
        },
    )
}

/// Digit collected by the menu `Gather`.
pub fn menu_selection(params: &WebhookParams, config: &FlowConfig) -> FlowOutcome {
    let call_sid = params.call_sid();
    let digits = params.get(keys::DIGITS);

    let (call_sid, digits) = match (call_sid, digits) {
        (Some(call_sid), Some(digits)) => (call_sid, digits),
        (call_sid, digits) => {
            debug!(call_sid=?call_sid, digits=?digits, "menu selection without call sid or digit");
            let label = if digits.is_some() {
                status::INVALID_SELECTION
            } else {
                status::NO_INPUT
            };
            return FlowOutcome::new(
                replay_menu(INVALID_INPUT_MESSAGE, config),
                call_sid,
                caller_update(params, WorkflowType::Ivr, label),
            );
        }
    };

    match digits {
        "1" => match &config.forward_to {
            None => {
                warn!(call_sid=%call_sid, "caller asked for the team but forwarding is not configured");
                FlowOutcome::new(
                    replay_menu(FORWARDING_UNAVAILABLE_MESSAGE, config),
                    Some(call_sid),
                    caller_update(params, WorkflowType::Ivr, status::FORWARDING_UNAVAILABLE),
                )
            }
            Some(number) => FlowOutcome::new(
                VoiceResponse::default()
                    .say(CONNECTING_MESSAGE)
                    .then(Instruction::Dial(Dial {
                        action: config.callback(DIAL_OUTCOME_PATH),
                        timeout: DIAL_TIMEOUT_SECS,
                        caller_id: config.caller_id.clone(),
                        number: number.clone(),
                    })),
                Some(call_sid),
                caller_update(params, WorkflowType::Forward, status::CONNECTING_AGENT),
            ),
        },
        "2" => FlowOutcome::new(
            voicemail_prompt(VOICEMAIL_PROMPT, config),
            Some(call_sid),
            caller_update(params, WorkflowType::Voicemail, status::RECORDING_VOICEMAIL),
        ),
        other => {
            debug!(call_sid=%call_sid, digits=%other, "invalid menu selection");
            FlowOutcome::new(
                replay_menu(INVALID_INPUT_MESSAGE, config),
                Some(call_sid),
                caller_update(params, WorkflowType::Ivr, status::INVALID_SELECTION),
            )
        }
    }
}

/// Completion of the forwarded leg.  Anything but `completed` falls through to voicemail.
pub fn dial_outcome(params: &WebhookParams, config: &FlowConfig) -> FlowOutcome {
    let dial_status = params
        .get(keys::DIAL_CALL_STATUS)
        .or_else(|| params.get(keys::CALL_STATUS))
        .unwrap_or(status::COMPLETED);
    let answered = dial_status.eq_ignore_ascii_case(status::COMPLETED);

    let response = if answered {
        VoiceResponse::default()
            .say(GOODBYE_MESSAGE)
            .then(Instruction::Hangup)
    } else {
        voicemail_prompt(DIAL_FAILED_MESSAGE, config)
    };
    let workflow_type = if answered {
        WorkflowType::Forward
    } else {
        WorkflowType::Voicemail
    };

    FlowOutcome::new(
        response,
        params.call_sid(),
        CallUpdate {
            duration_seconds: params.get(keys::DIAL_CALL_DURATION).and_then(parse_seconds),
            ..CallUpdate::new(workflow_type, dial_status)
        },
    )
}

/// Recording finished; store where it lives.
pub fn voicemail_captured(params: &WebhookParams, _config: &FlowConfig) -> FlowOutcome {
    let response = VoiceResponse::default()
        .say(VOICEMAIL_THANKS_MESSAGE)
        .then(Instruction::Hangup);

    match params.call_sid() {
        Some(call_sid) => FlowOutcome::new(
            response,
            Some(call_sid),
            CallUpdate {
                recording_url: params.owned(keys::RECORDING_URL),
                recording_duration_seconds: params
                    .get(keys::RECORDING_DURATION)
                    .and_then(parse_seconds),
                ..CallUpdate::new(WorkflowType::Voicemail, status::VOICEMAIL_RECORDED)
            },
        ),
        None => FlowOutcome::without_merge(response),
    }
}
