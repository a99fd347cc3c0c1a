//! End-to-end tests of both transports live under `tests/`.
