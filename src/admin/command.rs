//! Admin command parsing.
//!
//! Commands are slash-prefixed, keyword-first, space-separated. The parser
//! only validates shape; execution lives in the processor. Parse errors
//! carry enough detail to produce a corrective reply naming the problem.

use crate::error::CommandError;

/// Who a broadcast goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastTarget {
    All,
    City(String),
}

impl std::fmt::Display for BroadcastTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::City(city) => f.write_str(city),
        }
    }
}

/// A parsed admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `/set_price_sheet <url>`
    SetPriceSheet { url: String },
    /// `/orders`
    Orders,
    /// `/members`
    Members,
    /// `/mark_paid <phone>`
    MarkPaid { phone: String },
    /// `/broadcast <city|all> <message…>`
    Broadcast {
        target: BroadcastTarget,
        message: String,
    },
}

/// One-line usage summary, used in unknown-command replies.
pub const USAGE: &str = "Commands: /set_price_sheet <url> · /orders · /members \
· /mark_paid <phone> · /broadcast <city|all> <message>";

/// Parse one admin message into a command.
pub fn parse(text: &str) -> Result<AdminCommand, CommandError> {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return Err(CommandError::NotACommand);
    };

    // Keywords are exact tokens; `/ORDERS` is not a command.
    let mut parts = rest.splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or("").trim();

    match keyword {
        "set_price_sheet" => {
            if args.is_empty() {
                return Err(CommandError::MissingArgument {
                    keyword: "/set_price_sheet",
                    argument: "url",
                });
            }
            Ok(AdminCommand::SetPriceSheet {
                url: args.to_string(),
            })
        }
        "orders" => Ok(AdminCommand::Orders),
        "members" => Ok(AdminCommand::Members),
        "mark_paid" => {
            let phone = args.split_whitespace().next().unwrap_or("");
            if phone.is_empty() {
                return Err(CommandError::MissingArgument {
                    keyword: "/mark_paid",
                    argument: "phone",
                });
            }
            Ok(AdminCommand::MarkPaid {
                phone: phone.to_string(),
            })
        }
        "broadcast" => {
            let mut args_parts = args.splitn(2, char::is_whitespace);
            let target = args_parts.next().unwrap_or("").trim();
            if target.is_empty() {
                return Err(CommandError::MissingArgument {
                    keyword: "/broadcast",
                    argument: "city|all",
                });
            }
            let message = args_parts.next().unwrap_or("").trim();
            if message.is_empty() {
                return Err(CommandError::MissingArgument {
                    keyword: "/broadcast",
                    argument: "message",
                });
            }
            let target = if target.eq_ignore_ascii_case("all") {
                BroadcastTarget::All
            } else {
                BroadcastTarget::City(target.to_string())
            };
            Ok(AdminCommand::Broadcast {
                target,
                message: message.to_string(),
            })
        }
        _ => Err(CommandError::UnknownCommand {
            keyword: keyword.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_price_sheet() {
        assert_eq!(
            parse("/set_price_sheet https://example.com/prices.pdf"),
            Ok(AdminCommand::SetPriceSheet {
                url: "https://example.com/prices.pdf".into()
            })
        );
        assert_eq!(
            parse("/set_price_sheet"),
            Err(CommandError::MissingArgument {
                keyword: "/set_price_sheet",
                argument: "url",
            })
        );
    }

    #[test]
    fn bare_list_commands() {
        assert_eq!(parse("/orders"), Ok(AdminCommand::Orders));
        assert_eq!(parse("/members  "), Ok(AdminCommand::Members));
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            parse("/ORDERS"),
            Err(CommandError::UnknownCommand {
                keyword: "ORDERS".into()
            })
        );
        assert_eq!(
            parse("/Mark_Paid +100"),
            Err(CommandError::UnknownCommand {
                keyword: "Mark_Paid".into()
            })
        );
    }

    #[test]
    fn mark_paid_requires_phone() {
        assert_eq!(
            parse("/mark_paid +2348012345678"),
            Ok(AdminCommand::MarkPaid {
                phone: "+2348012345678".into()
            })
        );
        assert_eq!(
            parse("/mark_paid"),
            Err(CommandError::MissingArgument {
                keyword: "/mark_paid",
                argument: "phone",
            })
        );
    }

    #[test]
    fn broadcast_to_all() {
        assert_eq!(
            parse("/broadcast all Rice arrives Friday!"),
            Ok(AdminCommand::Broadcast {
                target: BroadcastTarget::All,
                message: "Rice arrives Friday!".into()
            })
        );
    }

    #[test]
    fn broadcast_to_city() {
        assert_eq!(
            parse("/broadcast Lagos Pickup moved to 3pm"),
            Ok(AdminCommand::Broadcast {
                target: BroadcastTarget::City("Lagos".into()),
                message: "Pickup moved to 3pm".into()
            })
        );
    }

    #[test]
    fn broadcast_requires_target_and_message() {
        assert_eq!(
            parse("/broadcast"),
            Err(CommandError::MissingArgument {
                keyword: "/broadcast",
                argument: "city|all",
            })
        );
        assert_eq!(
            parse("/broadcast Lagos"),
            Err(CommandError::MissingArgument {
                keyword: "/broadcast",
                argument: "message",
            })
        );
    }

    #[test]
    fn unknown_keyword() {
        assert_eq!(
            parse("/frobnicate now"),
            Err(CommandError::UnknownCommand {
                keyword: "frobnicate".into()
            })
        );
    }

    #[test]
    fn non_slash_is_not_a_command() {
        assert_eq!(parse("orders"), Err(CommandError::NotACommand));
    }
}
