//! Behaviour suites that drive a live host over its socket.

mod support;
