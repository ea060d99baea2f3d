//! Server numerics a client bot reacts to.
//!
//! Only the replies the connection state machine and diagnostics look at
//! are named here; any other three-digit reply still parses and is carried
//! as [`Command::Raw`](crate::Command::Raw) with its numeric intact.

#![allow(non_camel_case_types)]

/// A named server numeric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
#[non_exhaustive]
pub enum Response {
    /// 001 - Welcome to the network; registration accepted
    RPL_WELCOME = 1,
    /// 002 - Your host is running version
    RPL_YOURHOST = 2,
    /// 003 - Server creation date
    RPL_CREATED = 3,
    /// 004 - Server info
    RPL_MYINFO = 4,
    /// 005 - Supported features
    RPL_ISUPPORT = 5,
    /// 332 - Channel topic
    RPL_TOPIC = 332,
    /// 353 - Names list entry
    RPL_NAMREPLY = 353,
    /// 366 - End of names list
    RPL_ENDOFNAMES = 366,
    /// 372 - MOTD line
    RPL_MOTD = 372,
    /// 375 - MOTD start
    RPL_MOTDSTART = 375,
    /// 376 - End of MOTD
    RPL_ENDOFMOTD = 376,
    /// 403 - No such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 405 - Joined too many channels
    ERR_TOOMANYCHANNELS = 405,
    /// 422 - MOTD file missing
    ERR_NOMOTD = 422,
    /// 431 - No nickname given
    ERR_NONICKNAMEGIVEN = 431,
    /// 432 - Erroneous nickname
    ERR_ERRONEUSNICKNAME = 432,
    /// 433 - Nickname already in use
    ERR_NICKNAMEINUSE = 433,
    /// 436 - Nickname collision
    ERR_NICKCOLLISION = 436,
    /// 437 - Nick/channel temporarily unavailable
    ERR_UNAVAILRESOURCE = 437,
    /// 451 - You have not registered
    ERR_NOTREGISTERED = 451,
    /// 464 - Password incorrect
    ERR_PASSWDMISMATCH = 464,
    /// 465 - You are banned from this server
    ERR_YOUREBANNEDCREEP = 465,
    /// 470 - Channel forwarded elsewhere
    ERR_LINKCHANNEL = 470,
    /// 471 - Channel is full
    ERR_CHANNELISFULL = 471,
    /// 473 - Invite-only channel
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key
    ERR_BADCHANNELKEY = 475,
    /// 476 - Bad channel mask
    ERR_BADCHANMASK = 476,
    /// 477 - Channel needs registered nick
    ERR_NEEDREGGEDNICK = 477,
    /// 479 - Illegal channel name
    ERR_BADCHANNAME = 479,
    /// 489 - Channel requires TLS
    ERR_SECUREONLYCHAN = 489,
}

impl Response {
    /// The numeric value of this reply.
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Look up a named reply by its numeric value.
    pub fn from_code(code: u16) -> Option<Response> {
        use Response::*;
        let resp = match code {
            1 => RPL_WELCOME,
            2 => RPL_YOURHOST,
            3 => RPL_CREATED,
            4 => RPL_MYINFO,
            5 => RPL_ISUPPORT,
            332 => RPL_TOPIC,
            353 => RPL_NAMREPLY,
            366 => RPL_ENDOFNAMES,
            372 => RPL_MOTD,
            375 => RPL_MOTDSTART,
            376 => RPL_ENDOFMOTD,
            403 => ERR_NOSUCHCHANNEL,
            405 => ERR_TOOMANYCHANNELS,
            422 => ERR_NOMOTD,
            431 => ERR_NONICKNAMEGIVEN,
            432 => ERR_ERRONEUSNICKNAME,
            433 => ERR_NICKNAMEINUSE,
            436 => ERR_NICKCOLLISION,
            437 => ERR_UNAVAILRESOURCE,
            451 => ERR_NOTREGISTERED,
            464 => ERR_PASSWDMISMATCH,
            465 => ERR_YOUREBANNEDCREEP,
            470 => ERR_LINKCHANNEL,
            471 => ERR_CHANNELISFULL,
            473 => ERR_INVITEONLYCHAN,
            474 => ERR_BANNEDFROMCHAN,
            475 => ERR_BADCHANNELKEY,
            476 => ERR_BADCHANMASK,
            477 => ERR_NEEDREGGEDNICK,
            479 => ERR_BADCHANNAME,
            489 => ERR_SECUREONLYCHAN,
            _ => return None,
        };
        Some(resp)
    }

    /// 4xx and 5xx replies.
    #[inline]
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.code())
    }

    /// True for replies that end the MOTD burst (376, or 422 when there is none).
    pub fn ends_motd(&self) -> bool {
        matches!(self, Response::RPL_ENDOFMOTD | Response::ERR_NOMOTD)
    }

    /// True for replies that reject a requested nickname.
    pub fn rejects_nick(&self) -> bool {
        matches!(
            self,
            Response::ERR_NICKNAMEINUSE
                | Response::ERR_UNAVAILRESOURCE
                | Response::ERR_NICKCOLLISION
                | Response::ERR_ERRONEUSNICKNAME
        )
    }

    /// True for replies that refuse a JOIN. The channel is the second parameter.
    ///
    /// For 470 the second parameter is the requested channel and the third
    /// is where the server sent us instead.
    pub fn rejects_join(&self) -> bool {
        matches!(
            self,
            Response::ERR_NOSUCHCHANNEL
                | Response::ERR_TOOMANYCHANNELS
                | Response::ERR_LINKCHANNEL
                | Response::ERR_CHANNELISFULL
                | Response::ERR_INVITEONLYCHAN
                | Response::ERR_BANNEDFROMCHAN
                | Response::ERR_BADCHANNELKEY
                | Response::ERR_BADCHANMASK
                | Response::ERR_NEEDREGGEDNICK
                | Response::ERR_BADCHANNAME
                | Response::ERR_SECUREONLYCHAN
        )
    }
}
