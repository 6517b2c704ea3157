/// Renders an integer with `,` between each group of three digits.
///
/// Locale-independent: `1234567` becomes `"1,234,567"`, `-500` becomes `"-500"`.
pub fn group_thousands<N: Into<i128>>(value: N) -> String {
    let value: i128 = value.into();
    let digits = value.unsigned_abs().to_string();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
