/// Derive `as_str`, `Display` and `FromStr` for a fieldless enum stored as snake_case text.
///
/// The string forms must match the serde `rename_all = "snake_case"` names, because
/// the same text is used on the wire and in the database columns.
macro_rules! text_enum {
    ($name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::BakeryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err($crate::error::BakeryError::Validation(format!(
                        "Unknown {}: {}",
                        $label, s
                    ))),
                }
            }
        }
    };
}
