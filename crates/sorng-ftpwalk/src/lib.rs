//! # SortOfRemote NG: FTP walker
//!
//! FTP / FTPS client engine focused on directory traversal:
//!   • Control channel codec with multi-line reply aggregation
//!   • Timeout-bounded passive-mode data channel negotiation
//!   • FEAT capability probing and listing-format dispatch
//!   • MLSD and Unix `ls -l` listing parsers
//!   • Recursive, depth-bounded pre-order tree walker with
//!     caller-supplied error policy

pub mod ftp;
