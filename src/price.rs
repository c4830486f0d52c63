/// Whole-unit price as read from a page.
///
/// Wide enough that any digit run a page realistically shows is kept as-is,
/// even when it is obviously malformed.
pub type Price = u128;

/// First code point of each Unicode decimal digit block accepted besides
/// ASCII. Each block holds the digits zero to nine in order.
const DIGIT_ZEROS: &[u32] = &[
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0A66, // Gurmukhi
    0x0AE6, // Gujarati
    0x0B66, // Oriya
    0x0BE6, // Tamil
    0x0C66, // Telugu
    0x0CE6, // Kannada
    0x0D66, // Malayalam
    0x0E50, // Thai
    0xFF10, // Fullwidth
];

fn decimal_digit(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    let code = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| (zero..zero + 10).contains(&code))
        .map(|zero| code - zero)
}

/// Reduces extracted text to an integer price.
///
/// Every non-digit character is dropped and the remaining digits are read in
/// order, so `"₹1,29,990"` becomes `129990`. Decimal digits from Indic and
/// Arabic scripts count like ASCII ones. There is no decimal handling:
/// callers that split a price into whole and fraction parts join them first.
/// Implausibly large runs are returned unchanged; only a value past
/// `Price::MAX` fails, as does text with no digits.
pub fn normalize(text: &str) -> Option<Price> {
    let mut value: Option<Price> = None;
    for d in text.chars().filter_map(decimal_digit) {
        let acc = value.unwrap_or(0);
        value = Some(acc.checked_mul(10)?.checked_add(Price::from(d))?);
    }
    value
}

/// Formats a price for messages: `₹` + digits grouped by thousands.
pub fn format_price(symbol: &str, price: Price) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}", symbol, grouped)
}
