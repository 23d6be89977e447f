//! The process-wide memoizer.

use crate::config::CacheProperties;
use crate::memoizer::Memoizer;

use once_cell::sync::OnceCell;

// Set at most once, either by `init_global` or by the first `global()` call.
static GLOBAL_MEMOIZER: OnceCell<Memoizer> = OnceCell::new();

/// Installs `memoizer` as the process-wide instance.
///
/// Fails, handing the memoizer back, if a global instance already exists,
/// including one created implicitly by an earlier call to [`global`].
pub fn init_global(memoizer: Memoizer) -> Result<(), Memoizer> {
  GLOBAL_MEMOIZER.set(memoizer)
}

/// Provides the process-wide memoizer.
///
/// Without a prior [`init_global`] this is a memoizer with no cache
/// configuration, so every operation runs uncached.
///
/// # Examples
///
/// ```
/// use fibre_memo::{args, global};
///
/// let answer = global().result("answers", &args!["life"], || Ok::<_, String>(42));
/// assert_eq!(answer, Ok(42));
/// ```
pub fn global() -> &'static Memoizer {
  GLOBAL_MEMOIZER.get_or_init(|| Memoizer::new(CacheProperties::new()))
}
