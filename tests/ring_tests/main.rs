//! Rotating file tests
