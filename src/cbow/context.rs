use std::cmp;
use std::iter::FusedIterator;

use rand::Rng;

/// Iterator over the CBOW training windows of a sentence.
///
/// Every position of the sentence is a focus word once. The iterator
/// yields the focus word and the words within `context_size` positions
/// before and after it. Positions that have no context at all, which is
/// only the case in single-word sentences, are skipped.
pub struct ContextWindows<'a, R> {
    sentence: &'a [usize],
    context_size: usize,
    rng: Option<&'a mut R>,
    focus: usize,
}

impl<'a, R> ContextWindows<'a, R>
where
    R: Rng,
{
    /// Windows that always use the full context size.
    pub fn new(sentence: &'a [usize], context_size: usize) -> Self {
        ContextWindows {
            sentence,
            context_size,
            rng: None,
            focus: 0,
        }
    }

    /// Windows with a context size sampled from *[1, context_size]*.
    ///
    /// Sampling the window size gives more weight to nearby context words
    /// (Mikolov et al., 2013).
    pub fn reduced(sentence: &'a [usize], context_size: usize, rng: &'a mut R) -> Self {
        ContextWindows {
            sentence,
            context_size,
            rng: Some(rng),
            focus: 0,
        }
    }

    fn window_size(&mut self) -> usize {
        match self.rng {
            Some(ref mut rng) => rng.gen_range(1..=self.context_size),
            None => self.context_size,
        }
    }
}

impl<'a, R> Iterator for ContextWindows<'a, R>
where
    R: Rng,
{
    type Item = (usize, Vec<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.sentence.len() < 2 {
            return None;
        }

        if self.focus < self.sentence.len() {
            let i = self.focus;
            let context_size = self.window_size();
            let left = i - cmp::min(i, context_size);
            let right = cmp::min(i + context_size + 1, self.sentence.len());

            let contexts = (left..right)
                .filter(|&idx| idx != i)
                .map(|idx| self.sentence[idx])
                .collect();

            self.focus += 1;
            return Some((self.sentence[i], contexts));
        }

        None
    }
}

impl<'a, R> FusedIterator for ContextWindows<'a, R> where R: Rng {}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::ContextWindows;

    #[test]
    fn full_windows() {
        let sentence = [10, 11, 12, 13, 14];
        let windows: Vec<_> = ContextWindows::<XorShiftRng>::new(&sentence, 2).collect();
        assert_eq!(
            windows,
            vec![
                (10, vec![11, 12]),
                (11, vec![10, 12, 13]),
                (12, vec![10, 11, 13, 14]),
                (13, vec![11, 12, 14]),
                (14, vec![12, 13]),
            ]
        );
    }

    #[test]
    fn single_word_sentence_has_no_windows() {
        assert_eq!(ContextWindows::<XorShiftRng>::new(&[3], 5).count(), 0);
        assert_eq!(ContextWindows::<XorShiftRng>::new(&[], 5).count(), 0);
    }

    #[test]
    fn reduced_windows_are_bounded() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        let sentence: Vec<usize> = (0..50).collect();

        let mut n_windows = 0;
        for (focus, contexts) in ContextWindows::reduced(&sentence, 3, &mut rng) {
            n_windows += 1;
            assert!(!contexts.is_empty());
            assert!(contexts.len() <= 6);
            assert!(!contexts.contains(&focus));
            assert!(contexts
                .iter()
                .all(|&ctx| (ctx as isize - focus as isize).abs() <= 3));
        }
        assert_eq!(n_windows, 50);
    }
}
