/// Final transcript fragments of the caller's current utterance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utterance {
    text: String,
}

impl Utterance {
    /// Append a final fragment, separated from the previous one by a single space.
    pub fn push_final(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Take the collected text, leaving the utterance empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_fragments_with_single_space() {
        let mut utterance = Utterance::default();
        utterance.push_final("I need ");
        utterance.push_final("  ");
        utterance.push_final(" an oil change");
        assert_eq!(utterance.as_str(), "I need an oil change");
        assert_eq!(utterance.take(), "I need an oil change");
        assert!(utterance.is_empty());
    }
}
