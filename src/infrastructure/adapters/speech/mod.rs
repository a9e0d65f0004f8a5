//! Speech Adapter - 语音合成服务客户端实现

mod fake_speech_client;
mod http_speech_client;

pub use fake_speech_client::{FakeSpeechClient, FakeSpeechClientConfig, ScriptedFailure};
pub use http_speech_client::{HttpSpeechClient, HttpSpeechClientConfig};
