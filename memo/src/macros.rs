//! Public macros for building argument lists.

/// Builds a [`CallArgs`](crate::CallArgs) from non-null values.
///
/// Every value must satisfy [`KeyPart`](crate::KeyPart). For null arguments use
/// [`CallArgs::with_null`](crate::CallArgs::with_null).
///
/// # Examples
///
/// ```
/// use fibre_memo::{args, CallArgs, CallKey};
///
/// let a = args!["AAPL", 2024_u32];
/// let b = CallArgs::new().with("AAPL").with(2024_u32);
/// assert_eq!(a.key(), b.key());
///
/// assert_eq!(args![].key(), CallKey::Empty);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::CallArgs::new()
    };

    ($($arg:expr),+ $(,)?) => {
        $crate::CallArgs::from(::std::vec![$(::std::option::Option::Some($crate::Arg::new($arg))),+])
    };
}
