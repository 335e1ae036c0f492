use std::fmt;

use crate::result::Result;

use zeroize::Zeroizing;

/// Password buffer, wiped when dropped.
pub type Password = Zeroizing<Vec<u8>>;

/// Source of passwords which weren't supplied with the Bind call.
///
/// The bind engine consults the source only when a mechanism needs a password
/// and none was given, asking once per Bind. A returned password is used for that
/// Bind alone and dropped at its end. Returning `Ok(None)` means that no password
/// is available, and the Bind proceeds with an empty one.
pub trait CredentialSource {
    /// Obtain the password for `identity`, which is the bind DN or the SASL
    /// authentication identity.
    fn prompt_password(&mut self, identity: &str) -> Result<Option<Password>>;
}

impl<F> CredentialSource for F
where
    F: FnMut(&str) -> Result<Option<Password>>,
{
    fn prompt_password(&mut self, identity: &str) -> Result<Option<Password>> {
        self(identity)
    }
}

/// Credential source which never has a password. This is the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrompt;

impl CredentialSource for NoPrompt {
    fn prompt_password(&mut self, _identity: &str) -> Result<Option<Password>> {
        Ok(None)
    }
}

/// Credential source returning the same password for every identity, e.g. one
/// read from a password file.
#[derive(Clone)]
pub struct StaticPassword(Password);

impl StaticPassword {
    pub fn new<P: Into<Vec<u8>>>(password: P) -> Self {
        StaticPassword(Zeroizing::new(password.into()))
    }
}

impl fmt::Debug for StaticPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticPassword(..)")
    }
}

impl CredentialSource for StaticPassword {
    fn prompt_password(&mut self, _identity: &str) -> Result<Option<Password>> {
        Ok(Some(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::LdapError;

    #[test]
    fn closure_source_sees_identity() {
        let mut asked = Vec::new();
        let mut source = |identity: &str| -> Result<Option<Password>> {
            asked.push(identity.to_owned());
            Ok(Some(Zeroizing::new(b"pw".to_vec())))
        };
        let pw = source.prompt_password("cn=admin").expect("prompt");
        assert_eq!(pw.as_deref().map(|p| &p[..]), Some(&b"pw"[..]));
        drop(source);
        assert_eq!(asked, vec![String::from("cn=admin")]);
    }

    #[test]
    fn failing_source() {
        let mut source =
            |_: &str| -> Result<Option<Password>> { Err(LdapError::CredentialPrompt("no tty".into())) };
        assert!(matches!(
            source.prompt_password("u"),
            Err(LdapError::CredentialPrompt(_))
        ));
    }

    #[test]
    fn static_and_none() {
        let pw = StaticPassword::new("secret")
            .prompt_password("u")
            .expect("prompt")
            .expect("password");
        assert_eq!(&pw[..], b"secret");
        assert!(NoPrompt.prompt_password("u").expect("prompt").is_none());
        assert_eq!(format!("{:?}", StaticPassword::new("secret")), "StaticPassword(..)");
    }
}
