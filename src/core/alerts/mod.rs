// Alarm side of the engine.
//
// Architecture:
// - model.rs: Alarm state, sounds and emergency contacts
// - player.rs: Repeating alarm loop over a pluggable sound backend
// - audio.rs: Sound backends (rodio behind the `audio` feature)
// - escalation.rs: Per-contact message rate limiting
// - engine.rs: Per-reading evaluation tying everything together

pub mod audio;
pub mod engine;
pub mod escalation;
pub mod model;
pub mod player;
