//! Host-based tests for the ESP32 OTA updater
//! These tests run on the development machine, not on the ESP32

pub mod mocks;

#[cfg(test)]
mod install_tests;
#[cfg(test)]
mod scenarios;
