pub mod transcription;
pub mod translation;
