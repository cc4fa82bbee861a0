//! Diagnostic codes for categorizing compiler errors and warnings.
//!
//! Codes follow the format `{prefix}{number}` where `prefix` is "E" for
//! errors or "W" for warnings, and `number` is zero-padded to four digits.
//! The 5xxx range belongs to the constraint solver.

/// A unique code identifying a diagnostic message
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode {
    /// The prefix (e.g. "E" for error, "W" for warning)
    pub prefix: &'static str,
    /// The numeric identifier
    pub number: u32,
}

impl DiagnosticCode {
    /// Create a new diagnostic code
    #[inline]
    pub const fn new(prefix: &'static str, number: u32) -> Self {
        Self { prefix, number }
    }

    /// Get the prefix
    #[inline]
    pub const fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Get the numeric identifier
    #[inline]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Get the full code string (e.g. "E5001")
    pub fn as_str(&self) -> String {
        format!("{}{:04}", self.prefix, self.number)
    }

    // =========================================================================
    // SOLVER ERROR CODES (E5001-E5999)
    // =========================================================================

    /// E5001: No type class instance found
    pub const E_SOLVER_NO_INSTANCE: Self = Self::new("E", 5001);
    /// E5002: Overlapping type class instances
    pub const E_SOLVER_OVERLAPPING: Self = Self::new("E", 5002);
    /// E5003: Unknown type class
    pub const E_SOLVER_UNKNOWN_CLASS: Self = Self::new("E", 5003);
    /// E5004: Possibly infinite type class instance
    pub const E_SOLVER_POSSIBLY_INFINITE: Self = Self::new("E", 5004);

    // =========================================================================
    // SOLVER WARNING CODES (W5001-W5999)
    // =========================================================================

    /// W5001: User-defined warning solved from a Warn constraint
    pub const W_SOLVER_USER_WARNING: Self = Self::new("W", 5001);
}

impl std::fmt::Debug for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiagnosticCode({})", self.as_str())
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str() {
        assert_eq!(DiagnosticCode::new("E", 1).as_str(), "E0001");
        assert_eq!(DiagnosticCode::E_SOLVER_NO_INSTANCE.as_str(), "E5001");
        assert_eq!(DiagnosticCode::W_SOLVER_USER_WARNING.as_str(), "W5001");
    }

    #[test]
    fn test_display_and_debug() {
        let code = DiagnosticCode::E_SOLVER_OVERLAPPING;
        assert_eq!(format!("{}", code), "E5002");
        assert_eq!(format!("{:?}", code), "DiagnosticCode(E5002)");
    }

    #[test]
    fn test_code_equality() {
        assert_eq!(
            DiagnosticCode::new("E", 5001),
            DiagnosticCode::E_SOLVER_NO_INSTANCE
        );
        assert_ne!(
            DiagnosticCode::E_SOLVER_NO_INSTANCE,
            DiagnosticCode::E_SOLVER_OVERLAPPING
        );
    }
}
