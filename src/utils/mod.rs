pub mod speech;

pub use speech::{format_fee, format_minimum, sanitize_for_speech, spoken_digits};
