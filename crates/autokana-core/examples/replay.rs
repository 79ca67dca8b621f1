use autokana_core::{load_options, Binding, FieldEvent, FieldEventKind, Host, Options};

/// One scripted step: what the source field shows and what the IME reports.
enum Step {
    Compose(&'static str, &'static str),
    Commit(&'static str),
    Edit(&'static str),
    EditKana(&'static str),
}

const SESSION: &[Step] = &[
    Step::Compose("や", "や"),
    Step::Compose("やま", "やま"),
    Step::Compose("やまだ", "やまだ"),
    Step::Compose("山田", "山田"),
    Step::Commit("山田"),
    Step::Compose("山田た", "た"),
    Step::Compose("山田たろう", "たろう"),
    Step::Compose("山田太郎", "太郎"),
    Step::Commit("山田太郎"),
    Step::EditKana("やまだ たろう"),
    Step::Compose("山田太郎さ", "さ"),
    Step::Compose("山田太郎さん", "さん"),
    Step::Commit("山田太郎さん"),
    Step::Edit(""),
];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let options = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading options from {}", path);
            load_options(&path)?
        }
        None => Options::default(),
    };
    println!(
        "script={:?} clear_on_empty={}",
        options.script, options.clear_on_empty
    );

    let host = Host::new();
    let name = host.add_field("");
    let kana = host.add_field("");
    let binding = Binding::bind(&host, name, kana, options)?;

    for step in SESSION {
        let label = match step {
            Step::Compose(value, data) => {
                host.set_value(name, *value)?;
                host.post(FieldEvent::new(
                    name,
                    FieldEventKind::CompositionUpdate {
                        data: data.to_string(),
                    },
                ));
                host.post(FieldEvent::new(name, FieldEventKind::KeyUp));
                format!("compose {:<8} ime={}", value, data)
            }
            Step::Commit(value) => {
                host.set_value(name, *value)?;
                host.post(FieldEvent::new(
                    name,
                    FieldEventKind::CompositionEnd {
                        data: value.to_string(),
                    },
                ));
                format!("commit  {}", value)
            }
            Step::Edit(value) => {
                host.edit(name, *value)?;
                format!("edit    {:?}", value)
            }
            Step::EditKana(value) => {
                host.edit(kana, *value)?;
                format!("kana    {:?}", value)
            }
        };
        host.run_until_idle();

        let state = binding.state();
        println!(
            "{:<30} -> {:<16} (committed={:?} pending={:?})",
            label,
            host.value(kana)?,
            state.committed(),
            state.pending()
        );
    }

    binding.dispose();
    Ok(())
}
