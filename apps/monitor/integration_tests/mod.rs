// Integration tests for the monitor run loop against a real core.

mod monitor;
