//! Runnable demos live under `examples/`.
