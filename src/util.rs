use serde::Serialize;

pub static EOS: &str = "</s>";

/// Tolerance for small negative values.
const NEGATIVE_TOLERANCE: f32 = 1e-5;

/// Add a small value, to prevent returning Inf on underflow.
#[inline]
pub fn safe_ln(v: f32) -> f32 {
    (v + NEGATIVE_TOLERANCE).ln()
}

/// Index of the largest value, the first one wins on ties.
///
/// Returns `None` when there are no values.
pub fn argmax<'a>(values: impl IntoIterator<Item = &'a f32>) -> Option<usize> {
    values
        .into_iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, best_v)) if best_v >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}

#[derive(Serialize)]
pub(crate) struct VersionInfo {
    lmfrontier_version: &'static str,
    git_desc: Option<&'static str>,
}

impl VersionInfo {
    pub(crate) fn new() -> Self {
        VersionInfo {
            lmfrontier_version: env!("CARGO_PKG_VERSION"),
            git_desc: option_env!("MAYBE_LMFRONTIER_GIT_DESC"),
        }
    }
}

#[cfg(test)]
pub use self::test::*;

#[cfg(test)]
mod test {
    use ndarray::{ArrayView, Dimension};

    use super::{argmax, safe_ln};

    pub fn close(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    pub fn all_close(a: &[f32], b: &[f32], eps: f32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(&av, &bv)| close(av, bv, eps))
    }

    pub fn array_all_close<Ix>(a: ArrayView<f32, Ix>, b: ArrayView<f32, Ix>, eps: f32) -> bool
    where
        Ix: Dimension,
    {
        a.shape() == b.shape() && a.iter().zip(b).all(|(&av, &bv)| close(av, bv, eps))
    }

    #[test]
    fn argmax_test() {
        assert_eq!(argmax(&[] as &[f32]), None);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
        // Ties resolve to the first maximum.
        assert_eq!(argmax(&[0.5, 0.2, 0.5]), Some(0));
    }

    #[test]
    fn safe_ln_does_not_underflow() {
        assert!(safe_ln(0.0).is_finite());
        assert!(close(safe_ln(1.0), 0.0, 1e-4));
    }
}
