//! Statement parser for the configuration language.
//!
//! Produces component specifications the binder consumes; nothing here
//! touches the factory registry or the fabric. One statement form per
//! component:
//!
//! ```text
//! system  Id
//! cpu     Id [":" Id] ["(" opts ")"]
//! memory  Id [":" Id] ["=" Id ("," Id)*] size ["," base] ["(" opts ")"] ["load" "=" Str]
//! control Id [":" Id] ["=" Id ("," Id)*] ["(" opts ")"]
//! device  Id [":" Id] ["=" addr ["," size]] ["(" opts ")"] ["units" "=" Number]
//! ```

use retro80_core::{OptionSetting, OptionValue};

use crate::errors::ConfigError;
use crate::lexer::{Lexer, Token};

/// A parsed `cpu` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuSpec {
    /// CPU model name (`i8080`, `i8085`).
    pub model: String,
    /// Optional instance name.
    pub name: Option<String>,
    /// Raw option settings.
    pub opts: Vec<OptionSetting>,
}

/// A parsed `memory` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemSpec {
    /// Memory module type (`ram`, `rom`).
    pub kind: String,
    /// Optional instance name.
    pub name: Option<String>,
    /// CPU instance names this region binds to; empty means all.
    pub cpus: Vec<String>,
    /// Region size in cells, scale suffix applied.
    pub size: usize,
    /// Region base address.
    pub base: usize,
    /// Raw option settings.
    pub opts: Vec<OptionSetting>,
    /// Raw-binary image to splat at the region base.
    pub load: Option<String>,
}

/// A parsed `control` statement (an I/O controller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoSpec {
    /// Controller type name.
    pub kind: String,
    /// Optional instance name.
    pub name: Option<String>,
    /// CPU instance names this controller binds to; empty means all.
    pub cpus: Vec<String>,
    /// Raw option settings.
    pub opts: Vec<OptionSetting>,
}

/// A parsed `device` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevSpec {
    /// Device type name.
    pub kind: String,
    /// Optional instance name.
    pub name: Option<String>,
    /// Base port address.
    pub addr: Option<usize>,
    /// Port span override.
    pub size: Option<usize>,
    /// Raw option settings (a `control=<name>` setting selects the
    /// controller roster entry to attach to).
    pub opts: Vec<OptionSetting>,
    /// Unit count for multi-unit devices.
    pub units: Option<u64>,
}

/// Everything the binder needs, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    /// System model name from the `system` statement.
    pub system: Option<String>,
    /// `cpu` statements.
    pub cpus: Vec<CpuSpec>,
    /// `memory` statements.
    pub memories: Vec<MemSpec>,
    /// `control` statements.
    pub ios: Vec<IoSpec>,
    /// `device` statements.
    pub devices: Vec<DevSpec>,
}

/// Parses configuration text into component specifications.
///
/// The syntax is line-oriented; a line may carry several statements and
/// `#` comments out the rest of its line.
///
/// # Errors
///
/// [`ConfigError`] on the first lexical or grammatical fault.
pub fn parse(text: &str) -> Result<ParsedConfig, ConfigError> {
    let mut config = ParsedConfig::default();
    for line in text.lines() {
        let mut lexer = Lexer::new(line);
        lexer.advance(true)?;
        loop {
            match lexer.token() {
                Token::Eof => break,
                Token::Sys => parse_system(&mut lexer, &mut config)?,
                Token::Cpu => {
                    require_system(&config)?;
                    let spec = parse_cpu(&mut lexer)?;
                    config.cpus.push(spec);
                }
                Token::Mem => {
                    require_system(&config)?;
                    let spec = parse_memory(&mut lexer)?;
                    config.memories.push(spec);
                }
                Token::Ctl => {
                    require_system(&config)?;
                    let spec = parse_control(&mut lexer)?;
                    config.ios.push(spec);
                }
                Token::Dev => {
                    require_system(&config)?;
                    let spec = parse_device(&mut lexer)?;
                    config.devices.push(spec);
                }
                other => {
                    return Err(ConfigError::Unexpected {
                        expected: "statement keyword",
                        found: describe(other, &lexer),
                    })
                }
            }
        }
    }
    Ok(config)
}

fn require_system(config: &ParsedConfig) -> Result<(), ConfigError> {
    if config.system.is_none() {
        return Err(ConfigError::MissingSystem);
    }
    Ok(())
}

fn describe(token: Token, lexer: &Lexer) -> String {
    match token {
        Token::Id | Token::Str => format!("{:?}({})", token, lexer.text()),
        Token::Number => format!("Number({})", lexer.value()),
        _ => format!("{token:?}"),
    }
}

/// Reads the type name that must follow a statement keyword.
fn expect_name(lexer: &mut Lexer, statement: &'static str) -> Result<String, ConfigError> {
    lexer.advance(false)?;
    if lexer.token() != Token::Id {
        return Err(ConfigError::ExpectedName(statement));
    }
    Ok(lexer.text().to_string())
}

/// Parses the optional `":" Id` instance-name suffix. On entry the
/// current token is the one after the type name.
fn parse_instance_name(lexer: &mut Lexer) -> Result<Option<String>, ConfigError> {
    if lexer.token() != Token::Colon {
        return Ok(None);
    }
    lexer.advance(false)?;
    if lexer.token() != Token::Id {
        return Err(ConfigError::Unexpected {
            expected: "instance name after ':'",
            found: describe(lexer.token(), lexer),
        });
    }
    let name = lexer.text().to_string();
    lexer.advance(true)?;
    Ok(Some(name))
}

/// Parses `"(" opt ("," opt)* ")"`, leaving the lexer one past the
/// closing parenthesis. On entry the current token is `(`.
fn parse_opts(lexer: &mut Lexer) -> Result<Vec<OptionSetting>, ConfigError> {
    let mut opts = Vec::new();
    loop {
        lexer.advance(false)?;
        if lexer.token() == Token::RParen && opts.is_empty() {
            break;
        }
        if lexer.token() != Token::Id {
            return Err(ConfigError::Unexpected {
                expected: "option name",
                found: describe(lexer.token(), lexer),
            });
        }
        let name = lexer.text().to_string();
        lexer.advance(true)?;

        let value = if lexer.token() == Token::Equal {
            lexer.advance(true)?;
            let value = match lexer.token() {
                Token::Number => OptionValue::Number(lexer.value()),
                Token::Id | Token::Str => OptionValue::Text(lexer.text().to_string()),
                // Keyword-shaped values ("load", "ro", ...) keep their text.
                Token::Load | Token::Mount | Token::Ro | Token::Unit | Token::Units
                | Token::Ctl | Token::Sys | Token::Cpu | Token::Mem | Token::Dev => {
                    OptionValue::Text(lexer.text().to_string())
                }
                other => {
                    return Err(ConfigError::Unexpected {
                        expected: "option value",
                        found: describe(other, lexer),
                    })
                }
            };
            lexer.advance(true)?;
            value
        } else {
            OptionValue::Flag
        };
        opts.push(OptionSetting::new(name, value));

        match lexer.token() {
            Token::Comma => {}
            Token::RParen => break,
            other => {
                return Err(ConfigError::Unexpected {
                    expected: "',' or ')' in option list",
                    found: describe(other, lexer),
                })
            }
        }
    }
    lexer.advance(true)?;
    Ok(opts)
}

/// Parses `"=" Id ("," Id)*`, the CPU/controller set. On entry the
/// current token is `=`.
fn parse_name_set(lexer: &mut Lexer) -> Result<Vec<String>, ConfigError> {
    let mut names = Vec::new();
    loop {
        lexer.advance(false)?;
        if lexer.token() != Token::Id {
            return Err(ConfigError::Unexpected {
                expected: "name in '=' list",
                found: describe(lexer.token(), lexer),
            });
        }
        names.push(lexer.text().to_string());
        lexer.advance(true)?;
        if lexer.token() != Token::Comma {
            return Ok(names);
        }
    }
}

fn parse_system(lexer: &mut Lexer, config: &mut ParsedConfig) -> Result<(), ConfigError> {
    if config.system.is_some() {
        return Err(ConfigError::DuplicateSystem);
    }
    let name = expect_name(lexer, "system")?;
    config.system = Some(name);
    lexer.advance(true)?;
    Ok(())
}

fn parse_cpu(lexer: &mut Lexer) -> Result<CpuSpec, ConfigError> {
    let model = expect_name(lexer, "cpu")?;
    lexer.advance(true)?;
    let name = parse_instance_name(lexer)?;
    let opts = if lexer.token() == Token::LParen {
        parse_opts(lexer)?
    } else {
        Vec::new()
    };
    Ok(CpuSpec { model, name, opts })
}

fn parse_memory(lexer: &mut Lexer) -> Result<MemSpec, ConfigError> {
    let kind = expect_name(lexer, "memory")?;
    lexer.advance(true)?;
    let name = parse_instance_name(lexer)?;

    let cpus = if lexer.token() == Token::Equal {
        parse_name_set(lexer)?
    } else {
        Vec::new()
    };

    if lexer.token() != Token::Number {
        return Err(ConfigError::Unexpected {
            expected: "memory size",
            found: describe(lexer.token(), lexer),
        });
    }
    let size = as_usize(lexer.value());
    lexer.advance(true)?;

    let base = if lexer.token() == Token::Comma {
        lexer.advance(true)?;
        if lexer.token() != Token::Number {
            return Err(ConfigError::Unexpected {
                expected: "memory base",
                found: describe(lexer.token(), lexer),
            });
        }
        let base = as_usize(lexer.value());
        lexer.advance(true)?;
        base
    } else {
        0
    };

    let opts = if lexer.token() == Token::LParen {
        parse_opts(lexer)?
    } else {
        Vec::new()
    };

    let load = if lexer.token() == Token::Load {
        lexer.advance(true)?;
        if lexer.token() != Token::Equal {
            return Err(ConfigError::Unexpected {
                expected: "'=' after load",
                found: describe(lexer.token(), lexer),
            });
        }
        lexer.advance(true)?;
        if lexer.token() != Token::Str {
            return Err(ConfigError::Unexpected {
                expected: "quoted path after load=",
                found: describe(lexer.token(), lexer),
            });
        }
        let path = lexer.text().to_string();
        lexer.advance(true)?;
        Some(path)
    } else {
        None
    };

    Ok(MemSpec {
        kind,
        name,
        cpus,
        size,
        base,
        opts,
        load,
    })
}

fn parse_control(lexer: &mut Lexer) -> Result<IoSpec, ConfigError> {
    let kind = expect_name(lexer, "control")?;
    lexer.advance(true)?;
    let name = parse_instance_name(lexer)?;
    let cpus = if lexer.token() == Token::Equal {
        parse_name_set(lexer)?
    } else {
        Vec::new()
    };
    let opts = if lexer.token() == Token::LParen {
        parse_opts(lexer)?
    } else {
        Vec::new()
    };
    Ok(IoSpec {
        kind,
        name,
        cpus,
        opts,
    })
}

fn parse_device(lexer: &mut Lexer) -> Result<DevSpec, ConfigError> {
    let kind = expect_name(lexer, "device")?;
    lexer.advance(true)?;
    let name = parse_instance_name(lexer)?;

    let (addr, size) = if lexer.token() == Token::Equal {
        lexer.advance(true)?;
        if lexer.token() != Token::Number {
            return Err(ConfigError::Unexpected {
                expected: "device address",
                found: describe(lexer.token(), lexer),
            });
        }
        let addr = as_usize(lexer.value());
        lexer.advance(true)?;
        if lexer.token() == Token::Comma {
            lexer.advance(true)?;
            if lexer.token() != Token::Number {
                return Err(ConfigError::Unexpected {
                    expected: "device size",
                    found: describe(lexer.token(), lexer),
                });
            }
            let size = as_usize(lexer.value());
            lexer.advance(true)?;
            (Some(addr), Some(size))
        } else {
            (Some(addr), None)
        }
    } else {
        (None, None)
    };

    let opts = if lexer.token() == Token::LParen {
        parse_opts(lexer)?
    } else {
        Vec::new()
    };

    let units = if lexer.token() == Token::Units {
        lexer.advance(true)?;
        if lexer.token() != Token::Equal {
            return Err(ConfigError::Unexpected {
                expected: "'=' after units",
                found: describe(lexer.token(), lexer),
            });
        }
        lexer.advance(true)?;
        if lexer.token() != Token::Number {
            return Err(ConfigError::Unexpected {
                expected: "unit count",
                found: describe(lexer.token(), lexer),
            });
        }
        let units = lexer.value();
        lexer.advance(true)?;
        Some(units)
    } else {
        None
    };

    Ok(DevSpec {
        kind,
        name,
        addr,
        size,
        opts,
        units,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn as_usize(value: u64) -> usize {
    value as usize
}
