//! Canned prompt texts for the onboarding conversation.

/// Welcome message + name prompt, sent on a member's first-ever message.
pub const WELCOME: &str = "Welcome to the co-op! 🎉\n\n\
I'm the group-buying assistant. We pool orders so everyone gets \
wholesale prices.\n\n\
To get started, what's your name?";

/// Re-prompt when the name answer is empty.
pub const NAME_REPROMPT: &str = "Sorry, I didn't catch that. What's your name?";

/// City prompt, sent after the name is recorded.
pub fn city_prompt(name: &str) -> String {
    format!("Thanks, {name}! Which city are you in?")
}

/// Re-prompt when the city answer is empty.
pub const CITY_REPROMPT: &str = "Sorry, I didn't catch that. Which city are you in?";

/// The three membership options, sent after the city is recorded.
pub const MEMBERSHIP_OPTIONS: &str = "Great! Now pick a membership:\n\n\
• *One-time* — single group-buy access\n\
• *Monthly* — renews every month\n\
• *Per-use* — pay as you go\n\n\
Reply: One-time / Monthly / Per-use";

/// Re-prompt when the membership answer matches no tier.
pub const MEMBERSHIP_REPROMPT: &str = "I didn't recognise that plan.\n\n\
Please reply with one of: *One-time*, *Monthly*, or *Per-use*.";

/// Payment instructions, sent after the tier is recorded.
pub fn payment_prompt(referral_code: &str) -> String {
    format!(
        "You're almost in! Your referral code is *{referral_code}* — share it \
with friends.\n\n\
Please make your membership payment and reply here with your payment \
reference. An admin will confirm it shortly."
    )
}

/// Founding-member variant of the payment instructions.
pub fn founding_payment_prompt(referral_code: &str) -> String {
    format!(
        "Good news — you're one of our founding members, so membership is \
*free*! 🎉 Your referral code is *{referral_code}*.\n\n\
Reply anything to finish signing up."
    )
}

/// Completion message ending the onboarding flow.
pub const ONBOARDING_DONE: &str = "That's everything — welcome aboard! 🙌\n\n\
We've noted your payment for review. Send *help* any time to see what I \
can do.";

/// The static capabilities menu, also the FAQ fallback.
pub const HELP_MENU: &str = "Here's what I can help with:\n\n\
• *price* — current price sheet\n\
• *order <items>* — place an order, e.g. \"order 5 bags of rice\"\n\
• *referral* — your referral code and sign-ups\n\
• *help* — this menu";
