//! Configuration options for DESFire sessions

/// Configuration options for a [`Session`](crate::Session)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Check the CMAC on responses received over an EV1 secure channel
    ///
    /// The chaining vector is advanced either way; disabling this only skips
    /// the comparison.
    pub verify_response_mac: bool,

    /// Select the PICC level right after connecting
    pub select_picc_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub const fn new() -> Self {
        Self {
            verify_response_mac: true,
            select_picc_on_connect: false,
        }
    }

    /// Set whether response MACs are checked
    pub const fn with_verify_response_mac(mut self, verify: bool) -> Self {
        self.verify_response_mac = verify;
        self
    }

    /// Set whether the PICC level is selected on connect
    pub const fn with_select_picc_on_connect(mut self, select: bool) -> Self {
        self.select_picc_on_connect = select;
        self
    }
}
