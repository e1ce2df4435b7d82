// ✏️ Name Normalization - one canonical key form for students and subjects
//
// "  kat   o'neil " → "Kat O'Neil"
// "COMPUTING"      → "Computing"
//
// Every lookup in the store goes through these functions, so two inputs that
// differ only by case or whitespace always land on the same record.

/// Canonical form of a student name.
pub fn normalize_name(raw: &str) -> String {
    title_case(raw)
}

/// Canonical form of a subject name.
pub fn normalize_subject(raw: &str) -> String {
    title_case(raw)
}

/// Trim, collapse whitespace runs, and title-case.
///
/// A letter is uppercased when it starts the string or follows a non-letter
/// (space, apostrophe, hyphen, digit); every other letter is lowercased.
fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_is_letter = false;

    for (i, word) in raw.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
            prev_is_letter = false;
        }

        for c in word.chars() {
            if c.is_alphabetic() {
                // Case mappings that expand ('ß' → "SS") would break
                // idempotence, so those letters are kept as written
                if prev_is_letter {
                    push_single(&mut out, c, c.to_lowercase());
                } else {
                    push_single(&mut out, c, c.to_uppercase());
                }
                prev_is_letter = true;
            } else {
                out.push(c);
                prev_is_letter = false;
            }
        }
    }

    out
}

fn push_single<I: ExactSizeIterator<Item = char>>(out: &mut String, original: char, mapped: I) {
    if mapped.len() == 1 {
        out.extend(mapped);
    } else {
        out.push(original);
    }
}
