//! Shared sample stream between a realtime audio callback and an oscilloscope view.
//!
//! A [`stream::RingStream`] holds the most recent samples in a monotonic index
//! space. Audio callbacks push and pull blocks through [`callbacks`], and the
//! [`pager::OscilloscopePager`] picks trigger-aligned pages out of it for display.

pub mod audio;
pub mod callbacks;
pub mod codec;
pub mod error;
pub mod gate;
pub mod pager;
pub mod settings;
pub mod stream;
pub mod timespan;
pub mod timing;
pub mod tone;
