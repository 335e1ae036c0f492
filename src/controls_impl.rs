/// Conversion trait for single control instances.
///
/// The [`BindHandler::with_controls()`](crate::BindHandler::with_controls) method and its
/// sync counterpart accept a vector of controls, as dictated by the LDAP specification.
/// However, it's expected that most uses of controls involve a single instance, so
/// constructing a vector at the call site is noisy. If a control implements this trait,
/// its single instance may be used in the call, and a single-element vector is
/// constructed internally.
pub trait IntoRawControlVec {
    /// Create a control vector.
    fn into(self) -> Vec<RawControl>;
}

/// Trivial implementation for a control vector, returning itself.
impl IntoRawControlVec for Vec<RawControl> {
    fn into(self) -> Vec<RawControl> {
        self
    }
}

/// Blanket implementation for any control. The vector is constructed by the conversion
/// method.
impl<R> IntoRawControlVec for R
where
    RawControl: From<R>,
{
    fn into(self) -> Vec<RawControl> {
        vec![std::convert::Into::into(self)]
    }
}

/// Generic control.
///
/// Bind controls are never interpreted here. Request controls are handed to the
/// transport exactly as given, and response controls are returned to the caller
/// exactly as received.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawControl {
    /// OID of the control.
    pub ctype: String,
    /// Criticality, has no meaning on response.
    pub crit: bool,
    /// Raw value of the control, if any.
    pub val: Option<Vec<u8>>,
}

impl RawControl {
    /// Create a non-critical control with the given OID and no value.
    pub fn new<S: Into<String>>(ctype: S) -> Self {
        RawControl {
            ctype: ctype.into(),
            ..Default::default()
        }
    }

    /// Attach a value to the control.
    pub fn with_value<V: Into<Vec<u8>>>(mut self, val: V) -> Self {
        self.val = Some(val.into());
        self
    }

    /// Mark the control as critical. This operation consumes the control,
    /// and is irreversible.
    pub fn critical(mut self) -> Self {
        self.crit = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_control_into_vec() {
        let ctrls = IntoRawControlVec::into(RawControl::new("1.3.6.1.4.1.42.2.27.8.5.1"));
        assert_eq!(ctrls.len(), 1);
        assert!(!ctrls[0].crit);
        assert_eq!(ctrls[0].val, None);
    }

    #[test]
    fn critical_with_value() {
        let ctrl = RawControl::new("2.16.840.1.113730.3.4.16")
            .with_value(&b"dn:"[..])
            .critical();
        assert!(ctrl.crit);
        assert_eq!(ctrl.val.as_deref(), Some(&b"dn:"[..]));
    }
}
