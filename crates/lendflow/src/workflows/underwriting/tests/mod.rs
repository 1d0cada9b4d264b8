mod common;

mod prefill;
mod service;
