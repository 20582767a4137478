/// User-Agent tokens that identify phones and tablets, lowercased.
const MOBILE_TOKENS: &[&str] = &[
    "mobile",
    "android",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
    "webos",
    "windows phone",
    "kindle",
    "silk",
    "tablet",
];

/// Whether a User-Agent string looks like a mobile or tablet browser.
///
/// Depends on nothing but the string itself.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_TOKENS.iter().any(|token| match *token {
        // desktop IE on touch laptops reports "Tablet PC"
        "tablet" => ua.contains("tablet") && !ua.contains("tablet pc"),
        token => ua.contains(token),
    })
}
