//! integration suite for the xpressnet station, see `tests/`
