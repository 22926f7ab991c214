// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::SERVER_NAME;

const LOGO: [&str; 5] = [
    r" _   _    _    __  __ __  ____   __",
    r"| | | |  / \  |  \/  |  \/  \ \ / /",
    r"| |_| | / _ \ | |\/| | |\/| |\ V / ",
    r"|  _  |/ ___ \| |  | | |  | | | |  ",
    r"|_| |_/_/   \_\_|  |_|_|  |_| |_|  ",
];

const COLORS: [u8; 5] = [31, 33, 32, 36, 34];

/// 在标准输出打印启动横幅
pub fn print_banner(version: &str) {
    println!("{}", render(version, true));
}

pub fn render(version: &str, colored: bool) -> String {
    let mut out = String::new();
    for (line, color) in LOGO.iter().zip(COLORS.iter()) {
        if colored {
            out.push_str(&format!("\x1b[1;{}m{}\x1b[0m\n", color, line));
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&format!("{} {} - static content server\n", SERVER_NAME, version));
    out
}
