use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::vocab::{parse_byte_token, TokenType, Vocab};
use crate::error::{ModelError, Result};
use crate::gguf::metadata::GgufMetadata;

/// SentencePiece word-boundary marker.
const SPM_SPACE: &str = "\u{2581}";

/// Part of the input after special-token splitting.
enum Fragment<'a> {
    Text(&'a str),
    Token(u32),
}

/// One entry of the merge list. Merged-away symbols have empty text.
struct Symbol {
    text: String,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A mergeable adjacent pair. `len` is the merged byte length, used to spot
/// pairs whose sides changed after they were queued.
struct Bigram {
    priority: f32,
    left: usize,
    right: usize,
    len: usize,
}

impl Ord for Bigram {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.left.cmp(&self.left))
    }
}

impl PartialOrd for Bigram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Bigram {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Bigram {}

/// Tokenizer for SentencePiece (`llama`) and byte-level BPE (`gpt2`)
/// vocabularies stored in GGUF metadata.
#[derive(Debug, Clone)]
pub struct BpeTokenizer {
    pub vocab: Vocab,
    /// Merge pair to rank (lower merges first). Empty for score-merged vocabularies.
    merge_ranks: HashMap<(String, String), usize>,
    /// Control and user-defined tokens, longest text first.
    specials: Vec<u32>,
    /// GPT-2 byte-to-unicode table, only for `gpt2` vocabularies.
    byte_chars: Option<ByteChars>,
}

#[derive(Debug, Clone)]
struct ByteChars {
    encode: [char; 256],
    decode: HashMap<char, u8>,
}

impl ByteChars {
    /// GPT-2's reversible mapping of raw bytes onto printable characters.
    fn new() -> Self {
        let mut encode = ['\0'; 256];
        let mut next = 256u32;
        for b in 0..=255u8 {
            let printable = matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
            let code = if printable {
                b as u32
            } else {
                next += 1;
                next - 1
            };
            encode[b as usize] = char::from_u32(code).unwrap_or('\u{FFFD}');
        }
        let decode = encode.iter().enumerate().map(|(b, &c)| (c, b as u8)).collect();
        ByteChars { encode, decode }
    }
}

impl BpeTokenizer {
    /// Load the vocabulary and, when present, `tokenizer.ggml.merges`
    /// ("left right" strings, highest priority first).
    pub fn from_gguf(metadata: &GgufMetadata) -> Result<BpeTokenizer> {
        let vocab = Vocab::from_gguf(metadata)?;

        let byte_chars = match vocab.model.as_str() {
            "llama" => None,
            "gpt2" => Some(ByteChars::new()),
            other => {
                return Err(ModelError::Tokenizer(format!(
                    "unsupported tokenizer model '{}'",
                    other
                )))
            }
        };

        let merges = match metadata.get_string_array("tokenizer.ggml.merges") {
            Ok(m) => m,
            Err(ModelError::MissingKey(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let mut merge_ranks = HashMap::with_capacity(merges.len());
        for (rank, entry) in merges.iter().enumerate() {
            let (left, right) = entry
                .split_once(' ')
                .ok_or_else(|| ModelError::Tokenizer(format!("invalid merge entry: {:?}", entry)))?;
            merge_ranks
                .entry((left.to_string(), right.to_string()))
                .or_insert(rank);
        }

        let mut specials: Vec<u32> = (0..vocab.len() as u32)
            .filter(|&id| vocab.token_type(id).is_special() && !vocab.tokens[id as usize].is_empty())
            .collect();
        specials.sort_by_key(|&id| std::cmp::Reverse(vocab.tokens[id as usize].len()));

        log::debug!(
            "tokenizer '{}': {} tokens, {} merges, {} special tokens",
            vocab.model,
            vocab.len(),
            merge_ranks.len(),
            specials.len()
        );

        Ok(BpeTokenizer {
            vocab,
            merge_ranks,
            specials,
            byte_chars,
        })
    }

    /// Encode `text` into at most `capacity` token ids.
    ///
    /// With `add_special`, BOS (and EOS, if the vocabulary asks for it) are
    /// added around the text. With `parse_special`, control and user-defined
    /// token texts found in the input are emitted as those tokens instead of
    /// being tokenized as plain text.
    pub fn tokenize(
        &self,
        text: &str,
        capacity: usize,
        add_special: bool,
        parse_special: bool,
    ) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        if add_special && self.vocab.add_bos {
            out.push(self.vocab.bos_id);
        }

        let fragments = if parse_special {
            self.split_specials(text)
        } else {
            vec![Fragment::Text(text)]
        };

        let mut after_special = true;
        for fragment in fragments {
            match fragment {
                Fragment::Token(id) => {
                    out.push(id);
                    after_special = true;
                }
                Fragment::Text(raw) => {
                    self.encode_text(raw, after_special, &mut out)?;
                    after_special = false;
                }
            }
        }

        if add_special && self.vocab.add_eos {
            out.push(self.vocab.eos_id);
        }
        if out.len() > capacity {
            return Err(ModelError::TokenCapacity {
                needed: out.len(),
                capacity,
            });
        }
        Ok(out)
    }

    fn split_specials<'a>(&self, text: &'a str) -> Vec<Fragment<'a>> {
        let mut fragments = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < text.len() {
            let rest = &text[i..];
            let hit = self
                .specials
                .iter()
                .find(|&&id| rest.starts_with(self.vocab.tokens[id as usize].as_str()));
            match hit {
                Some(&id) => {
                    if start < i {
                        fragments.push(Fragment::Text(&text[start..i]));
                    }
                    fragments.push(Fragment::Token(id));
                    i += self.vocab.tokens[id as usize].len();
                    start = i;
                }
                None => i += rest.chars().next().map_or(1, char::len_utf8),
            }
        }
        if start < text.len() {
            fragments.push(Fragment::Text(&text[start..]));
        }
        fragments
    }

    fn encode_text(&self, raw: &str, after_special: bool, out: &mut Vec<u32>) -> Result<()> {
        let symbols: Vec<String> = match &self.byte_chars {
            Some(bytes) => raw
                .bytes()
                .map(|b| bytes.encode[b as usize].to_string())
                .collect(),
            None => {
                let mut escaped = String::with_capacity(raw.len() + 3);
                if self.vocab.add_space_prefix && after_special {
                    escaped.push_str(SPM_SPACE);
                }
                escaped.push_str(&raw.replace(' ', SPM_SPACE));
                let mut symbols = Vec::with_capacity(escaped.len());
                for ch in escaped.chars() {
                    let s = ch.to_string();
                    if self.vocab.token_to_id.contains_key(&s) {
                        symbols.push(s);
                    } else {
                        let mut buf = [0u8; 4];
                        for b in ch.encode_utf8(&mut buf).bytes() {
                            symbols.push(format!("<0x{:02X}>", b));
                        }
                    }
                }
                symbols
            }
        };

        for symbol in self.merge(symbols) {
            match self.vocab.token_to_id.get(&symbol) {
                Some(&id) => out.push(id),
                None => match self.vocab.unk_id {
                    Some(unk) => out.push(unk),
                    None => {
                        return Err(ModelError::Tokenizer(format!(
                            "cannot encode {:?} and the vocabulary has no unknown token",
                            symbol
                        )))
                    }
                },
            }
        }
        Ok(())
    }

    /// Repeatedly merge the best adjacent pair: lowest merge rank when the
    /// vocabulary has merges, otherwise highest score of the merged token.
    /// Ties go to the leftmost pair.
    ///
    /// Candidate pairs sit in a max-heap over a linked list of symbols; a
    /// popped pair whose sides have since changed is skipped.
    fn merge(&self, symbols: Vec<String>) -> Vec<String> {
        let n = symbols.len();
        let mut symbols: Vec<Symbol> = symbols
            .into_iter()
            .enumerate()
            .map(|(i, text)| Symbol {
                text,
                prev: i.checked_sub(1),
                next: (i + 1 < n).then_some(i + 1),
            })
            .collect();

        let mut queue = BinaryHeap::new();
        for i in 1..n {
            self.push_bigram(&symbols, i - 1, i, &mut queue);
        }

        while let Some(bigram) = queue.pop() {
            let (left, right) = (&symbols[bigram.left], &symbols[bigram.right]);
            if left.next != Some(bigram.right)
                || left.text.is_empty()
                || right.text.is_empty()
                || left.text.len() + right.text.len() != bigram.len
            {
                continue;
            }

            let right_text = std::mem::take(&mut symbols[bigram.right].text);
            let next = symbols[bigram.right].next;
            let left = &mut symbols[bigram.left];
            left.text.push_str(&right_text);
            left.next = next;
            let prev = left.prev;
            if let Some(next) = next {
                symbols[next].prev = Some(bigram.left);
                self.push_bigram(&symbols, bigram.left, next, &mut queue);
            }
            if let Some(prev) = prev {
                self.push_bigram(&symbols, prev, bigram.left, &mut queue);
            }
        }

        symbols
            .into_iter()
            .filter(|s| !s.text.is_empty())
            .map(|s| s.text)
            .collect()
    }

    fn push_bigram(&self, symbols: &[Symbol], left: usize, right: usize, queue: &mut BinaryHeap<Bigram>) {
        let (l, r) = (&symbols[left].text, &symbols[right].text);
        let priority = if self.merge_ranks.is_empty() {
            let merged = format!("{}{}", l, r);
            self.vocab
                .token_to_id
                .get(&merged)
                .map(|&id| self.vocab.scores[id as usize])
        } else {
            self.merge_ranks
                .get(&(l.clone(), r.clone()))
                .map(|&rank| -(rank as f32))
        };
        if let Some(priority) = priority {
            queue.push(Bigram {
                priority,
                left,
                right,
                len: l.len() + r.len(),
            });
        }
    }

    /// Bytes of one token, at most `max_len` long.
    ///
    /// Control tokens render as their text only with `render_special`.
    /// Byte tokens become the raw byte, so a multi-byte character may span
    /// several pieces.
    pub fn token_to_piece(&self, id: u32, max_len: usize, render_special: bool) -> Result<Vec<u8>> {
        let text = self
            .vocab
            .tokens
            .get(id as usize)
            .ok_or_else(|| ModelError::Tokenizer(format!("token id {} out of range", id)))?;

        let piece = match self.vocab.token_type(id) {
            TokenType::Control if !render_special => Vec::new(),
            TokenType::Control | TokenType::UserDefined | TokenType::Unknown => text.as_bytes().to_vec(),
            TokenType::Byte => match parse_byte_token(text) {
                Some(b) => vec![b],
                None => text.as_bytes().to_vec(),
            },
            _ => match &self.byte_chars {
                Some(bytes) => text
                    .chars()
                    .map(|c| bytes.decode.get(&c).copied().unwrap_or(b'?'))
                    .collect(),
                None => text.replace(SPM_SPACE, " ").into_bytes(),
            },
        };

        if piece.len() > max_len {
            return Err(ModelError::PieceTooLong {
                needed: piece.len(),
                max: max_len,
            });
        }
        Ok(piece)
    }

    /// Concatenate the pieces of `ids`, skipping control tokens.
    ///
    /// A leading space added by the space prefix is not removed.
    pub fn detokenize(&self, ids: &[u32]) -> Result<String> {
        let mut bytes = Vec::new();
        for &id in ids {
            bytes.extend(self.token_to_piece(id, usize::MAX, false)?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn n_vocab(&self) -> usize {
        self.vocab.len()
    }

    pub fn bos_id(&self) -> u32 {
        self.vocab.bos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.vocab.eos_id
    }

    pub fn is_eog(&self, id: u32) -> bool {
        self.vocab.is_eog(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gguf::GgufMetadataValue;

    fn strings(items: &[&str]) -> GgufMetadataValue {
        GgufMetadataValue::Array(
            items
                .iter()
                .map(|s| GgufMetadataValue::String(s.to_string()))
                .collect(),
        )
    }

    fn spm_metadata() -> GgufMetadata {
        let tokens = [
            "<unk>", "<s>", "</s>", "<end_of_turn>", "\u{2581}", "H", "e", "l", "o", "w", "r", "d",
            "ll", "llo", "\u{2581}H", "\u{2581}He", "\u{2581}Hello", "or", "ld", "\u{2581}w",
            "\u{2581}wor", "\u{2581}world", "<0x0A>", "<0xC3>", "<0xA9>",
        ];
        let scores: Vec<f32> = (0..tokens.len()).map(|i| i as f32).collect();
        let mut types = vec![1i32; tokens.len()];
        types[0] = 2;
        types[1..4].fill(3);
        types[22..25].fill(6);

        let mut md = GgufMetadata::default();
        md.entries.insert("tokenizer.ggml.model".into(), GgufMetadataValue::String("llama".into()));
        md.entries.insert("tokenizer.ggml.tokens".into(), strings(&tokens));
        md.entries.insert(
            "tokenizer.ggml.scores".into(),
            GgufMetadataValue::Array(scores.into_iter().map(GgufMetadataValue::F32).collect()),
        );
        md.entries.insert(
            "tokenizer.ggml.token_type".into(),
            GgufMetadataValue::Array(types.into_iter().map(GgufMetadataValue::I32).collect()),
        );
        md.entries.insert("tokenizer.ggml.bos_token_id".into(), GgufMetadataValue::U32(1));
        md.entries.insert("tokenizer.ggml.eos_token_id".into(), GgufMetadataValue::U32(2));
        md
    }

    fn spm() -> BpeTokenizer {
        BpeTokenizer::from_gguf(&spm_metadata()).unwrap()
    }

    #[test]
    fn test_tokenize_with_bos_and_space_prefix() {
        let tok = spm();
        let ids = tok.tokenize("Hello world", 64, true, true).unwrap();
        assert_eq!(ids, vec![1, 16, 21]);
        assert_eq!(tok.detokenize(&ids).unwrap(), " Hello world");
    }

    #[test]
    fn test_without_special() {
        let tok = spm();
        assert_eq!(tok.tokenize("Hello", 64, false, false).unwrap(), vec![16]);
    }

    #[test]
    fn test_special_tokens_parsed() {
        let tok = spm();
        let ids = tok.tokenize("Hello<end_of_turn>Hello", 64, true, true).unwrap();
        assert_eq!(ids, vec![1, 16, 3, 16]);

        // Without parsing, the marker is plain text and falls back to unknown.
        let plain = tok.tokenize("<end_of_turn>", 64, false, false).unwrap();
        assert!(!plain.contains(&3));
        assert!(plain.contains(&0));
    }

    #[test]
    fn test_byte_fallback() {
        let tok = spm();
        let ids = tok.tokenize("\n", 64, false, false).unwrap();
        assert_eq!(ids, vec![4, 22]);
        // 'é' is not in the vocabulary and encodes as two byte tokens.
        let ids = tok.tokenize("é", 64, false, false).unwrap();
        assert_eq!(ids, vec![4, 23, 24]);
        assert_eq!(tok.detokenize(&ids).unwrap(), " é");
    }

    #[test]
    fn test_long_single_fragment() {
        let tok = spm();
        let words = 4000;
        let text = vec!["Hello world"; words].join(" ");
        let ids = tok.tokenize(&text, text.len() + 128, true, true).unwrap();

        assert_eq!(ids.len(), 1 + 2 * words);
        assert_eq!(ids[0], 1);
        assert!(ids[1..].chunks(2).all(|pair| pair == [16, 21]));
    }

    #[test]
    fn test_merge_prefers_best_then_leftmost() {
        let tok = spm();
        let symbols = ["l", "l", "l", "l", "o"].map(String::from).to_vec();
        // The "ll" pairs tie, so they merge left to right into "ll ll o";
        // "llo" then outranks nothing else and takes the last two.
        assert_eq!(tok.merge(symbols), vec!["ll", "llo"]);
    }

    #[test]
    fn test_capacity_exceeded() {
        let tok = spm();
        let err = tok.tokenize("Hello world", 2, true, true).unwrap_err();
        assert!(matches!(err, ModelError::TokenCapacity { needed: 3, capacity: 2 }));
    }

    #[test]
    fn test_token_to_piece() {
        let tok = spm();
        assert_eq!(tok.token_to_piece(16, 128, false).unwrap(), b" Hello");
        assert_eq!(tok.token_to_piece(22, 128, false).unwrap(), b"\n");
        assert!(tok.token_to_piece(2, 128, false).unwrap().is_empty());
        assert_eq!(tok.token_to_piece(2, 128, true).unwrap(), b"</s>");
        assert!(matches!(
            tok.token_to_piece(16, 3, false),
            Err(ModelError::PieceTooLong { needed: 6, max: 3 })
        ));
        assert!(tok.token_to_piece(999, 128, false).is_err());
    }

    #[test]
    fn test_end_of_generation() {
        let tok = spm();
        assert!(tok.is_eog(2));
        // Found by text since no eot id key is present.
        assert!(tok.is_eog(3));
        assert!(!tok.is_eog(16));
    }

    #[test]
    fn test_gpt2_merges() {
        let mut md = GgufMetadata::default();
        md.entries.insert("tokenizer.ggml.model".into(), GgufMetadataValue::String("gpt2".into()));
        md.entries.insert(
            "tokenizer.ggml.tokens".into(),
            strings(&["<|bos|>", "<|eos|>", "h", "i", "\u{0120}", "hi", "\u{0120}hi"]),
        );
        md.entries.insert("tokenizer.ggml.merges".into(), strings(&["h i", "\u{0120} hi"]));
        md.entries.insert("tokenizer.ggml.bos_token_id".into(), GgufMetadataValue::U32(0));
        md.entries.insert("tokenizer.ggml.eos_token_id".into(), GgufMetadataValue::U32(1));
        md.entries.insert("tokenizer.ggml.add_bos_token".into(), GgufMetadataValue::Bool(false));

        let tok = BpeTokenizer::from_gguf(&md).unwrap();
        let ids = tok.tokenize("hi hi", 16, true, false).unwrap();
        assert_eq!(ids, vec![5, 6]);
        assert_eq!(tok.detokenize(&ids).unwrap(), "hi hi");
    }

    #[test]
    fn test_unsupported_model() {
        let mut md = spm_metadata();
        md.entries.insert("tokenizer.ggml.model".into(), GgufMetadataValue::String("bert".into()));
        assert!(matches!(BpeTokenizer::from_gguf(&md), Err(ModelError::Tokenizer(_))));
    }
}
