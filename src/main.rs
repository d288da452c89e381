use argh::FromArgs;
use btsh::Interpreter;

#[derive(FromArgs)]
/// Interactive command interpreter with background-task tracking.
struct Args {}

fn main() -> anyhow::Result<()> {
    // Rejects any stray positional arguments with a usage message.
    let _args: Args = argh::from_env();
    Interpreter::default().repl()
}
