use crate::call_flow::{Instruction, VoiceResponse};

pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

/// Serialize a controller response into a TwiML document.
pub fn render_twiml(response: &VoiceResponse) -> String {
    wrap_twiml(xmlserde::xml_serialize(Response::from(response)))
}

mod twiml {
    use xmlserde::xml_serde_enum;
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Gather")]
        Gather(GatherAction),
        #[xmlserde(name = b"Dial")]
        Dial(DialAction),
        #[xmlserde(name = b"Record")]
        Record(RecordAction),
        #[xmlserde(name = b"Redirect")]
        Redirect(RedirectAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"loop", ty = "attr")]
        pub lp: Option<u16>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct GatherAction {
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<Method>,
        #[xmlserde(name = b"numDigits", ty = "attr")]
        pub num_digits: Option<u16>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(ty = "untag")]
        pub prompts: Vec<GatherPrompt>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum GatherPrompt {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct DialAction {
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<Method>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(name = b"callerId", ty = "attr")]
        pub caller_id: Option<String>,
        #[xmlserde(ty = "untag")]
        pub nouns: Vec<DialNoun>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum DialNoun {
        #[xmlserde(name = b"Number")]
        Number(NumberNoun),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct NumberNoun {
        #[xmlserde(ty = "text")]
        pub number: String,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RecordAction {
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<Method>,
        #[xmlserde(name = b"maxLength", ty = "attr")]
        pub max_length: Option<u16>,
        #[xmlserde(name = b"playBeep", ty = "attr")]
        pub play_beep: Option<Toggle>,
        #[xmlserde(name = b"finishOnKey", ty = "attr")]
        pub finish_on_key: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RedirectAction {
        #[xmlserde(ty = "text")]
        pub url: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<Method>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {}

    xml_serde_enum! {
        #[derive(PartialEq, Eq, Debug)]
        Method {
            Get => "GET",
            Post => "POST",
        }
    }

    xml_serde_enum! {
        #[derive(PartialEq, Eq, Debug)]
        Toggle {
            True => "true",
            False => "false",
        }
    }

    impl From<bool> for Toggle {
        fn from(value: bool) -> Self {
            if value {
                Toggle::True
            } else {
                Toggle::False
            }
        }
    }
}
pub use twiml::*;

impl From<&VoiceResponse> for Response {
    fn from(response: &VoiceResponse) -> Self {
        let actions = response
            .instructions
            .iter()
            .map(|instruction| match instruction {
                Instruction::Say(speech) => ResponseAction::Say(SayAction {
                    text: speech.text.clone(),
                    voice: speech.voice.clone(),
                    language: speech.language.clone(),
                    ..Default::default()
                }),
                Instruction::Gather(gather) => ResponseAction::Gather(GatherAction {
                    action: gather.action.clone(),
                    method: Some(Method::Post),
                    num_digits: Some(gather.num_digits),
                    timeout: Some(gather.timeout),
                    prompts: gather
                        .prompt
                        .iter()
                        .map(|speech| {
                            GatherPrompt::Say(SayAction {
                                text: speech.text.clone(),
                                voice: speech.voice.clone(),
                                language: speech.language.clone(),
                                ..Default::default()
                            })
                        })
                        .collect(),
                }),
                Instruction::Dial(dial) => ResponseAction::Dial(DialAction {
                    action: dial.action.clone(),
                    method: Some(Method::Post),
                    timeout: Some(dial.timeout),
                    caller_id: dial.caller_id.clone(),
                    nouns: vec![DialNoun::Number(NumberNoun {
                        number: dial.number.clone(),
                    })],
                }),
                Instruction::Record(record) => ResponseAction::Record(RecordAction {
                    action: record.action.clone(),
                    method: Some(Method::Post),
                    max_length: Some(record.max_length),
                    play_beep: Some(record.play_beep.into()),
                    finish_on_key: Some(record.finish_on_key.clone()),
                }),
                Instruction::Redirect(url) => ResponseAction::Redirect(RedirectAction {
                    url: url.clone(),
                    method: Some(Method::Post),
                }),
                Instruction::Hangup => ResponseAction::Hangup(HangupAction {}),
            })
            .collect();

        Response { actions }
    }
}

mod webhook {
    use serde::Deserialize;
    use std::collections::HashMap;

    /// Parameter names Twilio uses in voice webhooks.
    pub mod keys {
        pub const CALL_SID: &str = "CallSid";
        pub const FROM: &str = "From";
        pub const TO: &str = "To";
        pub const DIRECTION: &str = "Direction";
        pub const DIGITS: &str = "Digits";
        pub const CALL_STATUS: &str = "CallStatus";
        pub const DIAL_CALL_STATUS: &str = "DialCallStatus";
        pub const DIAL_CALL_DURATION: &str = "DialCallDuration";
        pub const RECORDING_URL: &str = "RecordingUrl";
        pub const RECORDING_DURATION: &str = "RecordingDuration";
    }

    /// The flat, form-encoded parameter set Twilio posts to a webhook.  Twilio makes no promise
    /// about which keys are present, so every read is optional and an empty value counts as
    /// missing.
    #[derive(Clone, Debug, Default, Deserialize)]
    #[serde(transparent)]
    pub struct WebhookParams(HashMap<String, String>);

    impl WebhookParams {
        pub fn from_form(body: &str) -> Result<Self, serde_urlencoded::de::Error> {
            serde_urlencoded::from_str(body)
        }

        pub fn get(&self, key: &str) -> Option<&str> {
            self.0
                .get(key)
                .map(String::as_str)
                .filter(|value| !value.is_empty())
        }

        pub fn owned(&self, key: &str) -> Option<String> {
            self.get(key).map(str::to_string)
        }

        pub fn call_sid(&self) -> Option<&str> {
            self.get(keys::CALL_SID)
        }

        /// Required keys that are absent from this payload, in the order given.
        pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
            required
                .iter()
                .copied()
                .filter(|key| self.get(key).is_none())
                .collect()
        }
    }

    impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WebhookParams {
        fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
            Self(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            )
        }
    }
}
pub use webhook::*;
