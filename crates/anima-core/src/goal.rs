//! Session goal embedding: hashed bag of tokens, L2-normalized.

/// Vector width.
pub const DIMENSIONS: usize = 64;
const MIN_TOKEN_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "you", "your", "are", "was", "but", "not", "have",
    "what", "about", "want", "would", "like", "just", "from", "into",
];

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(&t.as_str()))
}

/// Embeds `text`. An input without usable tokens yields the zero vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSIONS];
    for token in tokens(text) {
        let bucket = (fnv1a(token.as_bytes()) % DIMENSIONS as u64) as usize;
        v[bucket] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Cosine similarity of two embeddings; 0 when either is empty or zero.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }
}

/// Similarity of a message to a stored goal vector.
pub fn on_topic(goal_vector: &[f32], text: &str) -> f32 {
    similarity(goal_vector, &embed(text))
}
