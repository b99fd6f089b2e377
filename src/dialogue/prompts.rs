pub const GREETING: &str = "Thanks for calling. I can help you book an appointment.";
pub const ASK_BOTH: &str =
    "Could you tell me your name, and what day and time works best for you?";
pub const ASK_NAME: &str = "And could I get your name, please?";
pub const ASK_TIME: &str = "What day and time would you like to come in?";
pub const ONE_MOMENT: &str = "One moment, please.";
pub const REPEAT: &str = "Sorry, I didn't catch that. Could you say that again?";
pub const BOOKED: &str = "You're all set. We'll confirm by text shortly. Goodbye.";
pub const EXHAUSTED: &str = "I'm sorry we couldn't get everything today. \
    Someone from our team will call you back shortly. Goodbye.";
pub const CONNECTING: &str = "Please hold while I connect you with a member of our team.";
pub const TEAM_BUSY: &str =
    "Sorry, the team is tied up right now, but I can get you booked in myself.";
pub const GOODBYE: &str = "Thanks for calling. Goodbye.";

/// Spoken when a turn fails internally; the call is ended.
pub const APOLOGY: &str = "Sorry, something went wrong on our end. \
    A member of our team will call you back shortly. Goodbye.";

/// Spoken when the extraction service gives nothing usable.
pub const EXTRACTION_FALLBACK: &str = "Sorry, I had a little trouble understanding that. Let's try again.";
