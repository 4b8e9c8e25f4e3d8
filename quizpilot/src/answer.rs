//! Turning the assistant's free-form reply into one of the four options.

use {
    once_cell::sync::Lazy,
    regex::Regex,
    serde::{Deserialize, Serialize},
    strum::{Display, EnumIter, EnumString},
    tracing::{debug, warn},
};

static STANDALONE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-D])\b").expect("valid regex"));
static STANDALONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-4])\b").expect("valid regex"));

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum AnswerLetter {
    A,
    B,
    C,
    D,
}

impl AnswerLetter {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            _ => None,
        }
    }

    /// Maps option numbers 1..=4 to A..=D.
    pub fn from_option_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::A),
            2 => Some(Self::B),
            3 => Some(Self::C),
            4 => Some(Self::D),
            _ => None,
        }
    }
}

/// How the assistant is asked to name the chosen option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerFormat {
    #[default]
    Letter,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Last standalone letter among `found` candidates.
    StandaloneLetter { found: usize },
    /// The whole response is a single letter.
    WholeResponse,
    /// Last standalone option number among `found` candidates.
    OptionNumber { number: u32, found: usize },
    /// Last A-D character anywhere in the text, even inside a word.
    AnyLetter { found: usize },
    /// Nothing recognizable; fell back to option A.
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    pub letter: AnswerLetter,
    pub method: ExtractionMethod,
}

impl Extraction {
    pub fn is_default(&self) -> bool {
        self.method == ExtractionMethod::Defaulted
    }
}

/// Picks the answer out of the assistant's reply.
///
/// When several candidates are present the last one wins: assistants tend to
/// restate earlier answers before the current one. Text with no candidate at
/// all maps to `A` and is reported as [`ExtractionMethod::Defaulted`].
pub fn extract_answer(response: &str, format: AnswerFormat) -> Extraction {
    let response = response.trim().to_uppercase();

    match format {
        AnswerFormat::Letter => {
            let letters: Vec<AnswerLetter> = STANDALONE_LETTER
                .find_iter(&response)
                .filter_map(|m| m.as_str().chars().next().and_then(AnswerLetter::from_char))
                .collect();
            if let Some(&letter) = letters.last() {
                debug!("extracted {} (found {} letters, using last)", letter, letters.len());
                return Extraction {
                    letter,
                    method: ExtractionMethod::StandaloneLetter {
                        found: letters.len(),
                    },
                };
            }
            if let Some(letter) = single_letter(&response) {
                return Extraction {
                    letter,
                    method: ExtractionMethod::WholeResponse,
                };
            }
        }
        AnswerFormat::Number => {
            let numbers: Vec<u32> = STANDALONE_NUMBER
                .find_iter(&response)
                .filter_map(|m| m.as_str().parse().ok())
                .collect();
            if let Some(&number) = numbers.last() {
                if let Some(letter) = AnswerLetter::from_option_number(number) {
                    debug!(
                        "extracted {} -> {} (found {} numbers, using last)",
                        number,
                        letter,
                        numbers.len()
                    );
                    return Extraction {
                        letter,
                        method: ExtractionMethod::OptionNumber {
                            number,
                            found: numbers.len(),
                        },
                    };
                }
            }
        }
    }

    let letters: Vec<AnswerLetter> = response.chars().filter_map(AnswerLetter::from_char).collect();
    if let Some(&letter) = letters.last() {
        debug!("fallback extracted {} (found {} letters, using last)", letter, letters.len());
        return Extraction {
            letter,
            method: ExtractionMethod::AnyLetter {
                found: letters.len(),
            },
        };
    }

    warn!("could not parse an answer from {:?}, defaulting to A", response);
    Extraction {
        letter: AnswerLetter::A,
        method: ExtractionMethod::Defaulted,
    }
}

/// Whether copied response text looks like a finished answer.
///
/// Accepts a bare letter or any standalone A-D occurrence. With the number
/// format a standalone 1-4 is accepted as well.
pub fn is_plausible_answer(response: &str, format: AnswerFormat) -> bool {
    let response = response.trim().to_uppercase();
    if response.is_empty() {
        return false;
    }
    if single_letter(&response).is_some() || STANDALONE_LETTER.is_match(&response) {
        return true;
    }
    format == AnswerFormat::Number && STANDALONE_NUMBER.is_match(&response)
}

fn single_letter(text: &str) -> Option<AnswerLetter> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => AnswerLetter::from_char(c),
        _ => None,
    }
}

#[test]
fn extracts_bare_letter() {
    let extraction = extract_answer("B", AnswerFormat::Letter);
    assert_eq!(extraction.letter, AnswerLetter::B);
    assert!(!extraction.is_default());
}

#[test]
fn extracts_letter_from_sentence() {
    assert_eq!(
        extract_answer("The answer is C", AnswerFormat::Letter).letter,
        AnswerLetter::C
    );
    assert_eq!(
        extract_answer("  the answer is d.\n", AnswerFormat::Letter).letter,
        AnswerLetter::D
    );
}

#[test]
fn last_letter_wins() {
    let extraction = extract_answer("A B", AnswerFormat::Letter);
    assert_eq!(extraction.letter, AnswerLetter::B);
    assert_eq!(
        extraction.method,
        ExtractionMethod::StandaloneLetter { found: 2 }
    );
}

#[test]
fn number_format_maps_to_letter() {
    let extraction = extract_answer("3", AnswerFormat::Number);
    assert_eq!(extraction.letter, AnswerLetter::C);
    assert_eq!(
        extraction.method,
        ExtractionMethod::OptionNumber {
            number: 3,
            found: 1
        }
    );
    assert_eq!(
        extract_answer("Option 2, no wait, 4", AnswerFormat::Number).letter,
        AnswerLetter::D
    );
}

#[test]
fn falls_back_to_letters_inside_words() {
    // No standalone letter, but "BAD" still contains candidates; the last one is D.
    let extraction = extract_answer("BAD", AnswerFormat::Letter);
    assert_eq!(extraction.letter, AnswerLetter::D);
    assert_eq!(extraction.method, ExtractionMethod::AnyLetter { found: 3 });
}

#[test]
fn empty_response_defaults_to_a() {
    let extraction = extract_answer("", AnswerFormat::Letter);
    assert_eq!(extraction.letter, AnswerLetter::A);
    assert!(extraction.is_default());

    let extraction = extract_answer("???", AnswerFormat::Number);
    assert!(extraction.is_default());
}

#[test]
fn plausible_answers() {
    assert!(is_plausible_answer("c", AnswerFormat::Letter));
    assert!(is_plausible_answer("Answer: B", AnswerFormat::Letter));
    assert!(!is_plausible_answer("", AnswerFormat::Letter));
    assert!(!is_plausible_answer("Thinking...", AnswerFormat::Letter));
    assert!(!is_plausible_answer("2", AnswerFormat::Letter));
    assert!(is_plausible_answer("2", AnswerFormat::Number));
}
