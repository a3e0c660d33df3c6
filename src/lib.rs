//! `mailpager`: a terminal pager for email messages.
//!
//! The core is [`pager`]: a lazily laid-out, classified view over a seekable
//! byte stream, drawn onto any [`pager::Surface`]. [`source`] turns files and
//! RFC 5322 messages into such streams and [`tui`] drives the pager in a
//! terminal.

pub mod config;
pub mod error;
pub mod logging;
pub mod pager;
pub mod source;
pub mod theme;
pub mod tui;
