//! Scripted in-process FTP server for I/O tests.
//!
//! Serves a virtual tree over a loopback control connection with PASV data
//! channels. Behaviour is tuned through `FakeServerBuilder`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::ftp::types::FtpConnectionConfig;

/// A node of the served tree.
#[derive(Debug, Clone)]
pub enum VNode {
    File(Vec<u8>),
    Dir(Vec<(String, VNode)>),
    Link(String),
}

impl VNode {
    pub fn file(body: &str) -> Self {
        VNode::File(body.as_bytes().to_vec())
    }

    pub fn dir(children: Vec<(&str, VNode)>) -> Self {
        VNode::Dir(
            children
                .into_iter()
                .map(|(n, c)| (n.to_string(), c))
                .collect(),
        )
    }

    pub fn link(target: &str) -> Self {
        VNode::Link(target.to_string())
    }

    fn lookup(&self, components: &[String]) -> Option<&VNode> {
        match components.split_first() {
            None => Some(self),
            Some((head, rest)) => match self {
                VNode::Dir(children) => children
                    .iter()
                    .find(|(n, _)| n == head)
                    .and_then(|(_, c)| c.lookup(rest)),
                _ => None,
            },
        }
    }
}

/// What the server answers to `FEAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feat {
    Mlsd,
    /// Success reply without any listing extension.
    Basic,
    Eplf,
    Nlst,
    /// `500` to FEAT.
    Refused,
}

#[derive(Debug, Clone)]
struct Behaviour {
    tree: VNode,
    feat: Feat,
    password: Option<String>,
    user_logs_in: bool,
    stall_pasv: bool,
    deny: HashMap<String, u16>,
    fail_transfer: Vec<String>,
    hang_up_after: Vec<String>,
}

pub struct FakeServerBuilder {
    behaviour: Behaviour,
}

impl FakeServerBuilder {
    pub fn tree(mut self, tree: VNode) -> Self {
        self.behaviour.tree = tree;
        self
    }

    pub fn feat(mut self, feat: Feat) -> Self {
        self.behaviour.feat = feat;
        self
    }

    pub fn password(mut self, pass: &str) -> Self {
        self.behaviour.password = Some(pass.to_string());
        self
    }

    pub fn user_logs_in_directly(mut self) -> Self {
        self.behaviour.user_logs_in = true;
        self
    }

    /// Never answer `PASV`.
    pub fn stall_pasv(mut self) -> Self {
        self.behaviour.stall_pasv = true;
        self
    }

    /// Refuse transfers of `path` with `code` on the opening reply.
    pub fn deny(mut self, path: &str, code: u16) -> Self {
        self.behaviour.deny.insert(path.to_string(), code);
        self
    }

    /// Send the data of `path` but close the transfer with 426.
    pub fn fail_transfer(mut self, path: &str) -> Self {
        self.behaviour.fail_transfer.push(path.to_string());
        self
    }

    /// Send the data of `path`, then drop the control connection without
    /// a closing reply.
    pub fn hang_up_after(mut self, path: &str) -> Self {
        self.behaviour.hang_up_after.push(path.to_string());
        self
    }

    pub async fn start(self) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Shared::default();
        let behaviour = Arc::new(self.behaviour);

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                let behaviour = behaviour.clone();
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(sock, behaviour, state).await;
                });
            }
        });

        FakeServer { port, state }
    }
}

#[derive(Clone, Default)]
struct Shared {
    commands: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

pub struct FakeServer {
    port: u16,
    state: Shared,
}

impl FakeServer {
    pub fn builder() -> FakeServerBuilder {
        FakeServerBuilder {
            behaviour: Behaviour {
                tree: VNode::dir(vec![]),
                feat: Feat::Mlsd,
                password: None,
                user_logs_in: false,
                stall_pasv: false,
                deny: HashMap::new(),
                fail_transfer: Vec::new(),
                hang_up_after: Vec::new(),
            },
        }
    }

    pub async fn start(tree: VNode) -> FakeServer {
        Self::builder().tree(tree).start().await
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn config(&self) -> FtpConnectionConfig {
        FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port: self.port,
            connect_timeout_sec: 5,
            pasv_timeout_sec: 1,
            ..Default::default()
        }
    }

    /// Every command received so far, across connections.
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn upload(&self, path: &str) -> Option<Vec<u8>> {
        self.state.uploads.lock().unwrap().get(path).cloned()
    }
}

/// Sample tree `/ = {a.txt, sub/ = {b.txt}}`.
pub fn sample_tree() -> VNode {
    VNode::dir(vec![
        ("a.txt", VNode::file("alpha")),
        ("sub", VNode::dir(vec![("b.txt", VNode::file("bravo"))])),
    ])
}

fn resolve(cwd: &[String], arg: &str) -> Vec<String> {
    let mut parts: Vec<String> = if arg.starts_with('/') {
        Vec::new()
    } else {
        cwd.to_vec()
    };
    for c in arg.split('/') {
        match c {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other.to_string()),
        }
    }
    parts
}

fn display(parts: &[String]) -> String {
    format!("/{}", parts.join("/"))
}

fn mlsd_body(node: &VNode) -> String {
    let mut out = String::from("type=cdir;perm=el; .\r\ntype=pdir;perm=el; ..\r\n");
    if let VNode::Dir(children) = node {
        for (name, child) in children {
            let line = match child {
                VNode::File(b) => format!(
                    "type=file;size={};modify=20260101120000;perm=r; {}",
                    b.len(),
                    name
                ),
                VNode::Dir(_) => format!("type=dir;perm=el; {}", name),
                VNode::Link(_) => format!("type=OS.unix=symlink;perm=r; {}", name),
            };
            out.push_str(&line);
            out.push_str("\r\n");
        }
    }
    out
}

fn list_body(node: &VNode) -> String {
    let mut out = String::new();
    if let VNode::Dir(children) = node {
        for (name, child) in children {
            let line = match child {
                VNode::File(b) => format!(
                    "-rw-r--r--   1 user group {:>6} Jan  1 00:00 {}",
                    b.len(),
                    name
                ),
                VNode::Dir(_) => format!("drwxr-xr-x   2 user group   4096 Jan  1 00:00 {}", name),
                VNode::Link(t) => format!(
                    "lrwxrwxrwx   1 user group {:>6} Jan  1 00:00 {} -> {}",
                    t.len(),
                    name,
                    t
                ),
            };
            out.push_str(&line);
            out.push_str("\r\n");
        }
    }
    out
}

async fn reply(sock: &mut TcpStream, text: &str) -> std::io::Result<()> {
    sock.write_all(format!("{}\r\n", text).as_bytes()).await
}

async fn serve(sock: TcpStream, b: Arc<Behaviour>, state: Shared) -> std::io::Result<()> {
    let mut ctrl = BufReader::new(sock);
    let mut cwd: Vec<String> = Vec::new();
    let mut pasv: Option<TcpListener> = None;

    ctrl.get_mut()
        .write_all(b"220-Fake FTP ready\r\n welcome\r\n220 Ready\r\n")
        .await?;

    loop {
        let mut line = String::new();
        if ctrl.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end().to_string();
        state.commands.lock().unwrap().push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((v, a)) => (v.to_ascii_uppercase(), a.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };
        let sock = ctrl.get_mut();

        match verb.as_str() {
            "USER" if b.user_logs_in => reply(sock, "230 Logged in").await?,
            "USER" => reply(sock, "331 Password required").await?,
            "PASS" => match &b.password {
                Some(p) if *p != arg => reply(sock, "530 Login incorrect").await?,
                _ => reply(sock, "230 Logged in").await?,
            },
            "FEAT" => {
                let body = match b.feat {
                    Feat::Mlsd => "211-Features:\r\n MDTM\r\n MLST type*;size*;modify*;\r\n SIZE\r\n211 End",
                    Feat::Basic => "211-Features:\r\n SIZE\r\n211 End",
                    Feat::Eplf => "211-Features:\r\n EPLF\r\n211 End",
                    Feat::Nlst => "211-Features:\r\n NLST\r\n211 End",
                    Feat::Refused => "500 FEAT not understood",
                };
                reply(sock, body).await?
            }
            "PASV" if b.stall_pasv => {}
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                pasv = Some(listener);
                reply(
                    sock,
                    &format!(
                        "227 Entering Passive Mode (10,9,8,7,{},{})",
                        port / 256,
                        port % 256
                    ),
                )
                .await?
            }
            "MLSD" | "LIST" | "NLST" | "RETR" | "STOR" => {
                let parts = resolve(&cwd, &arg);
                let path = display(&parts);
                let Some(listener) = pasv.take() else {
                    reply(sock, "425 Use PASV first").await?;
                    continue;
                };
                if let Some(code) = b.deny.get(&path) {
                    reply(sock, &format!("{} {}: refused", code, path)).await?;
                    continue;
                }
                let node = b.tree.lookup(&parts);
                let body = match (verb.as_str(), node) {
                    ("MLSD", Some(n @ VNode::Dir(_))) => Some(mlsd_body(n).into_bytes()),
                    ("LIST", Some(n @ VNode::Dir(_))) => Some(list_body(n).into_bytes()),
                    ("NLST", Some(VNode::Dir(children))) => Some(
                        children
                            .iter()
                            .map(|(n, _)| format!("{}\r\n", n))
                            .collect::<String>()
                            .into_bytes(),
                    ),
                    ("RETR", Some(VNode::File(bytes))) => Some(bytes.clone()),
                    ("STOR", _) => Some(Vec::new()),
                    _ => None,
                };
                let Some(body) = body else {
                    reply(sock, &format!("550 {}: No such file or directory", path)).await?;
                    continue;
                };

                reply(sock, "150 Opening data connection").await?;
                let (mut data, _) = listener.accept().await?;
                let moved = if verb == "STOR" {
                    let mut received = Vec::new();
                    let read = data.read_to_end(&mut received).await;
                    state.uploads.lock().unwrap().insert(path.clone(), received);
                    read.map(|_| ())
                } else {
                    match data.write_all(&body).await {
                        Ok(()) => data.shutdown().await,
                        Err(e) => Err(e),
                    }
                };
                drop(data);
                if b.hang_up_after.contains(&path) {
                    return Ok(());
                }

                let sock = ctrl.get_mut();
                if moved.is_err() || b.fail_transfer.contains(&path) {
                    reply(sock, "426 Connection closed; transfer aborted").await?;
                } else {
                    reply(sock, "226 Transfer complete").await?;
                }
            }
            "TYPE" | "NOOP" | "PBSZ" | "PROT" => reply(sock, "200 OK").await?,
            "CWD" => {
                let parts = resolve(&cwd, &arg);
                if matches!(b.tree.lookup(&parts), Some(VNode::Dir(_))) {
                    cwd = parts;
                    reply(sock, "250 Directory changed").await?
                } else {
                    reply(sock, "550 No such directory").await?
                }
            }
            "CDUP" => {
                cwd.pop();
                reply(sock, "250 Directory changed").await?
            }
            "PWD" => {
                let text = format!("257 \"{}\" is the current directory", display(&cwd));
                reply(sock, &text).await?
            }
            "MKD" => {
                let text = format!("257 \"{}\" created", display(&resolve(&cwd, &arg)));
                reply(sock, &text).await?
            }
            "RMD" | "DELE" | "RNTO" => reply(sock, "250 Requested file action okay").await?,
            "RNFR" => reply(sock, "350 Ready for destination name").await?,
            "SIZE" => match b.tree.lookup(&resolve(&cwd, &arg)) {
                Some(VNode::File(bytes)) => reply(sock, &format!("213 {}", bytes.len())).await?,
                _ => reply(sock, "550 Could not get file size").await?,
            },
            "SYST" => reply(sock, "215 UNIX Type: L8").await?,
            "STAT" => {
                reply(sock, "211-FTP server status:\r\n Connected to 127.0.0.1\r\n211 End of status").await?
            }
            "QUIT" => {
                reply(sock, "221 Goodbye").await?;
                return Ok(());
            }
            _ => reply(sock, "500 Unknown command").await?,
        }
    }
}
