use std::collections::HashMap;

const EN: &[(&str, &str)] = &[
    // Registry
    ("no_commands", "No saved commands"),
    ("saved_commands", "Saved commands ({0}):"),
    ("never_used", "never"),
    ("usage_summary", "used {0}x, last {1}"),
    ("created", "Saved '{0}' ({1})"),
    ("updated", "Updated '{0}'"),
    ("deleted", "Deleted '{0}'"),
    ("nothing_to_update", "Nothing to change, pass at least one field"),
    ("not_found_target", "No command matches '{0}'"),
    ("ambiguous_target", "'{0}' matches several commands: {1}"),
    ("confirm_delete_prompt", "Delete '{0}'? Type yes to confirm: "),
    ("delete_aborted", "Aborted"),
    ("no_matches", "No matches found"),
    ("registry_path", "Registry file: {0}"),
    ("config_path", "Config file: {0}"),
    // Show
    ("field_command", "Command"),
    ("field_description", "Description"),
    ("field_cwd", "Working directory"),
    ("field_env", "Environment"),
    ("field_tags", "Tags"),
    ("field_params", "Parameters"),
    ("field_mise", "Through mise"),
    ("field_created", "Created"),
    ("field_updated", "Updated"),
    ("field_last_used", "Last used"),
    ("field_use_count", "Use count"),
    ("required", "required"),
    ("default", "default"),
    // Run
    ("prompt_parameter", "{0}: "),
    ("prompt_options", "  options: {0}"),
    ("command_completed", "Command completed, exit code: {0}"),
    ("execution_time", "Execution time"),
    ("stdout", "Standard output:"),
    ("stderr", "Error output:"),
    // Errors
    ("error_open_registry", "Failed to open command registry"),
    ("error_read_input", "Failed to read input"),
];

const ZH: &[(&str, &str)] = &[
    ("no_commands", "没有已保存的命令"),
    ("saved_commands", "已保存的命令 ({0}):"),
    ("never_used", "从未"),
    ("usage_summary", "使用 {0} 次，最近 {1}"),
    ("created", "已保存 '{0}' ({1})"),
    ("updated", "已更新 '{0}'"),
    ("deleted", "已删除 '{0}'"),
    ("nothing_to_update", "没有需要修改的内容，请至少指定一个字段"),
    ("not_found_target", "没有匹配 '{0}' 的命令"),
    ("ambiguous_target", "'{0}' 匹配多个命令: {1}"),
    ("confirm_delete_prompt", "删除 '{0}'？输入 yes 确认: "),
    ("delete_aborted", "已取消"),
    ("no_matches", "没有找到匹配的命令"),
    ("registry_path", "命令文件: {0}"),
    ("config_path", "配置文件: {0}"),
    ("field_command", "命令"),
    ("field_description", "描述"),
    ("field_cwd", "工作目录"),
    ("field_env", "环境变量"),
    ("field_tags", "标签"),
    ("field_params", "参数"),
    ("field_mise", "通过 mise 运行"),
    ("field_created", "创建时间"),
    ("field_updated", "更新时间"),
    ("field_last_used", "最近使用"),
    ("field_use_count", "使用次数"),
    ("required", "必填"),
    ("default", "默认"),
    ("prompt_parameter", "{0}: "),
    ("prompt_options", "  可选值: {0}"),
    ("command_completed", "命令执行完成，退出码: {0}"),
    ("execution_time", "执行时间"),
    ("stdout", "标准输出:"),
    ("stderr", "错误输出:"),
    ("error_open_registry", "打开命令文件失败"),
    ("error_read_input", "读取输入失败"),
];

pub struct I18n {
    translations: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    current_lang: &'static str,
}

impl I18n {
    pub fn new(lang: &str) -> Self {
        let mut translations: HashMap<&'static str, HashMap<&'static str, &'static str>> =
            HashMap::new();
        translations.insert("en", EN.iter().copied().collect());
        translations.insert("zh", ZH.iter().copied().collect());

        let current_lang = if lang.starts_with("zh") || lang == "cn" || lang == "chinese" {
            "zh"
        } else {
            "en"
        };

        Self {
            translations,
            current_lang,
        }
    }

    /// Looks up `key`, falling back to English and then to the key itself.
    pub fn t(&self, key: &str) -> String {
        [self.current_lang, "en"]
            .iter()
            .find_map(|lang| self.translations.get(lang).and_then(|m| m.get(key)))
            .map_or_else(|| key.to_string(), |v| v.to_string())
    }

    pub fn t_format(&self, key: &str, args: &[&str]) -> String {
        let mut result = self.t(key);
        for (i, arg) in args.iter().enumerate() {
            result = result.replace(&format!("{{{}}}", i), arg);
        }
        result
    }
}
